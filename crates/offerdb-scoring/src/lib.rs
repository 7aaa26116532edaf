//! Rule-based deal quality scoring.

mod scorer;

pub use scorer::{discount_percent, score_deal, DealScore};
