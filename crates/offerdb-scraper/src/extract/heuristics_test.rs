use offerdb_core::Category;

use super::*;

fn base() -> Url {
    Url::parse("https://bank.example.com/en/offers").unwrap()
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn clean_text_collapses_whitespace() {
    assert_eq!(clean_text("  20%\n\t off   today "), "20% off today");
}

#[test]
fn discount_figure_prefers_percentage() {
    assert_eq!(discount_figure("Enjoy 25 % off").as_deref(), Some("25%"));
    assert_eq!(discount_figure("Up to 12.5% cashback").as_deref(), Some("12.5%"));
    assert_eq!(
        discount_figure("SAR 50 off your bill").as_deref(),
        Some("SAR 50 off your bill")
    );
    assert_eq!(discount_figure("Free dessert"), None);
}

#[test]
fn offer_line_needs_percent_or_standalone_off() {
    assert!(is_offer_line("15% discount"));
    assert!(is_offer_line("Buy one get one OFF"));
    assert!(!is_offer_line("Official partner"));
    assert!(!is_offer_line("Valid until 31 Dec"));
}

#[test]
fn resolve_link_handles_relative_and_ignored_hrefs() {
    let base = base();
    assert_eq!(
        resolve_link(&base, "/en/offers/starbucks").unwrap().as_deref(),
        Some("https://bank.example.com/en/offers/starbucks")
    );
    assert_eq!(resolve_link(&base, "#top").unwrap(), None);
    assert_eq!(resolve_link(&base, "javascript:void(0)").unwrap(), None);
}

#[test]
fn resolve_link_rejects_malformed_href() {
    let err = resolve_link(&base(), "https://[::1").unwrap_err();
    assert!(matches!(err, ExtractError::UnresolvableLink { .. }));
}

#[test]
fn containers_are_parsed_independently() {
    let html = Html::parse_document(
        r#"<div class="offers">
             <div class="offer-card">
               <h3>Starbucks</h3>
               <span class="brand">Starbucks Coffee</span>
               <p>Get 20% off on all beverages</p>
               <span class="date">Valid until December 31, 2026</span>
               <a href="/en/offers/starbucks">Details</a>
             </div>
             <div class="offer-card">
               <p>A card with no heading at all</p>
             </div>
             <div class="offer-card">
               <h3>Grand Hotel</h3>
               <p>15% off room rates</p>
               <small>Excludes public holidays</small>
             </div>
           </div>"#,
    );
    let drafts = scan_containers(&html, &GENERIC_PROFILE, &base(), &CategoryKeywords::default());
    assert_eq!(drafts.len(), 2);

    let first = &drafts[0];
    assert_eq!(first.title, "Starbucks");
    assert_eq!(first.merchant.as_deref(), Some("Starbucks Coffee"));
    assert_eq!(first.description.as_deref(), Some("Get 20% off on all beverages"));
    assert_eq!(first.discount.as_deref(), Some("Get 20% off on all beverages"));
    assert_eq!(first.validity.as_deref(), Some("Valid until December 31, 2026"));
    assert_eq!(
        first.origin_url.as_deref(),
        Some("https://bank.example.com/en/offers/starbucks")
    );
    assert_eq!(first.category, Some(Category::Dining));

    let second = &drafts[1];
    assert_eq!(second.merchant.as_deref(), Some("Grand Hotel"));
    assert_eq!(second.terms.as_deref(), Some("Excludes public holidays"));
    assert_eq!(second.category, Some(Category::Travel));
    assert_eq!(second.validity, None);
}

#[test]
fn container_tier_is_empty_without_matches() {
    let html = Html::parse_document("<main><p>Nothing to see</p></main>");
    assert!(scan_containers(&html, &GENERIC_PROFILE, &base(), &CategoryKeywords::default()).is_empty());
}

#[test]
fn anchors_are_deduplicated_by_absolute_url() {
    let html = Html::parse_document(
        r#"<a href="/en/Offers/CardsOffers/nova-restaurant">Nova Restaurant 15% off</a>
           <a href="https://bank.example.com/en/Offers/CardsOffers/nova-restaurant">Nova again</a>
           <a href="/en/Offers/CardsOffers/">All offers</a>
           <a href="/en/Offers/CardsOffers/x">Go</a>
           <a href="/en/about">About us</a>"#,
    );
    let base = Url::parse("https://bank.example.com/en/Offers/CardsOffers").unwrap();
    let drafts = scan_anchors(&html, "/offers/cardsoffers/", &base, &CategoryKeywords::default());
    assert_eq!(drafts.len(), 1);
    let draft = &drafts[0];
    assert_eq!(draft.title, "Nova Restaurant 15% off");
    assert_eq!(draft.merchant.as_deref(), Some("Nova Restaurant 15% off"));
    assert_eq!(draft.discount.as_deref(), Some("15%"));
    assert_eq!(draft.category, Some(Category::Dining));
    assert_eq!(
        draft.origin_url.as_deref(),
        Some("https://bank.example.com/en/Offers/CardsOffers/nova-restaurant")
    );
}

#[test]
fn line_scan_collects_window_context() {
    let text = lines(&[
        "Dining & Groceries",
        "Starbucks",
        "20% off on all beverages",
        "Valid until 31 Dec 2026",
        "Applicable on SAB Credit Cards",
    ]);
    let drafts = scan_lines(&text, &ScanWindow::default(), &CategoryKeywords::default());
    assert_eq!(drafts.len(), 1);
    let draft = &drafts[0];
    assert_eq!(draft.title, "20% off on all beverages");
    assert_eq!(draft.merchant.as_deref(), Some("Starbucks"));
    assert_eq!(draft.discount.as_deref(), Some("20%"));
    assert_eq!(draft.validity.as_deref(), Some("Valid until 31 Dec 2026"));
    assert_eq!(
        draft.applicable_cards.as_deref(),
        Some("Applicable on SAB Credit Cards")
    );
    assert_eq!(draft.category, Some(Category::Dining));
}

#[test]
fn line_scan_respects_window_sizes() {
    let text = lines(&[
        "Far Away Merchant",
        "filler one",
        "filler two",
        "filler three",
        "10% off",
    ]);
    let window = ScanWindow {
        merchant_lookback: 1,
        ..ScanWindow::default()
    };
    let drafts = scan_lines(&text, &window, &CategoryKeywords::default());
    assert_eq!(drafts[0].merchant.as_deref(), Some("filler three"));

    let validity_far = lines(&["Shop", "10% off", "a", "b", "Valid until 1 May 2026"]);
    let window = ScanWindow {
        validity_lookahead: 2,
        ..ScanWindow::default()
    };
    let drafts = scan_lines(&validity_far, &window, &CategoryKeywords::default());
    assert_eq!(drafts[0].validity, None);
}

#[test]
fn line_scan_infers_category_without_label() {
    let text = lines(&["Luxe Spa", "30% off massages"]);
    let drafts = scan_lines(&text, &ScanWindow::default(), &CategoryKeywords::default());
    assert_eq!(drafts[0].category, Some(Category::Lifestyle));
}
