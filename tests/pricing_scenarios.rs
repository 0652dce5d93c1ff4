//! Price decision scenarios driven through the public engine API

use std::sync::Arc;

use marketguard::database::models::{ChangeType, CompetitorLink, Product};
use marketguard::database::MemoryRepository;
use marketguard::events::CollectingEventSink;
use marketguard::pricing::{AlertReason, Decision, GuardViolation, PriceDecisionEngine, PricingError};

fn setup(margin: f64, competitor_price: f64) -> (Arc<MemoryRepository>, PriceDecisionEngine, i64) {
    let repo = Arc::new(MemoryRepository::new());
    let events = Arc::new(CollectingEventSink::new());

    let product_id = repo
        .insert_product(Product {
            id: 0,
            name: "Samsung Galaxy A55".to_string(),
            current_price: 1000.0,
            min_price: 800.0,
            cost_price: 700.0,
            auto_price_adjustment: true,
            auto_adjustment_margin: Some(margin),
            is_active: true,
        })
        .unwrap();

    repo.insert_link(CompetitorLink {
        id: 0,
        product_id,
        competitor_id: 1,
        url: "https://shop.example/a55".to_string(),
        current_price: Some(competitor_price),
        previous_price: None,
        is_available: true,
        competitor_product_name: None,
        last_checked_at: None,
        last_price_change_at: None,
    })
    .unwrap();

    let engine = PriceDecisionEngine::new(repo.clone(), events, 100.0);
    (repo, engine, product_id)
}

fn assert_within_bounds(product: &Product) {
    assert!(product.current_price >= product.min_price);
    assert!(product.current_price >= product.cost_price);
}

#[tokio::test]
async fn test_undercut_within_guards_is_applied() {
    let (repo, engine, product_id) = setup(100.0, 900.0);

    let decision = engine.evaluate_product(product_id).await.unwrap();
    assert!(decision.is_adjusted());

    let product = repo.product(product_id).unwrap();
    assert_eq!(product.current_price, 800.0);
    assert_within_bounds(&product);

    let entry = repo.price_history(product_id).pop().unwrap();
    assert_eq!(entry.change_amount, -200.0);
    assert_eq!(entry.change_type, ChangeType::Decrease);
    assert!(entry.is_auto_adjusted);
}

#[tokio::test]
async fn test_undercut_below_minimum_only_alerts() {
    let (repo, engine, product_id) = setup(250.0, 900.0);

    match engine.evaluate_product(product_id).await.unwrap() {
        Decision::AlertOnly {
            recommendation,
            reason,
        } => {
            assert_eq!(recommendation.recommended_price, 650.0);
            assert!(matches!(
                reason,
                AlertReason::Guard(GuardViolation::BelowMinPrice { .. })
            ));
        }
        _ => panic!("expected an alert-only decision"),
    }

    let product = repo.product(product_id).unwrap();
    assert_eq!(product.current_price, 1000.0);
    assert_eq!(repo.notifications().len(), 1);
}

#[tokio::test]
async fn test_manual_price_below_cost_is_rejected() {
    let (repo, engine, product_id) = setup(100.0, 1200.0);
    let before = repo.price_history(product_id).len();

    let result = engine.set_manual_price(product_id, 690.0).await;
    assert!(matches!(
        result,
        Err(PricingError::Guard(GuardViolation::BelowMinPrice { .. }))
            | Err(PricingError::Guard(GuardViolation::BelowCostPrice { .. }))
    ));

    assert_eq!(repo.product(product_id).unwrap().current_price, 1000.0);
    assert_eq!(repo.price_history(product_id).len(), before);
}

#[tokio::test]
async fn test_repeated_passes_keep_price_within_bounds() {
    let (repo, engine, product_id) = setup(100.0, 900.0);

    for _ in 0..5 {
        let summary = engine.evaluate_all().await.unwrap();
        assert_eq!(summary.failed, 0);
        assert_within_bounds(&repo.product(product_id).unwrap());
    }

    // Only the first pass moves the price; later passes find it competitive
    let adjustments = repo
        .price_history(product_id)
        .iter()
        .filter(|entry| entry.is_auto_adjusted)
        .count();
    assert_eq!(adjustments, 1);
    assert_eq!(repo.product(product_id).unwrap().current_price, 800.0);
}
