//! Whole Wheat Pasta Bake, from generator payload to committed deduction.
//!
//! GREEN when:
//! - 50 prepared, 10 left: pasta 100 -> 92, sauce 20 -> 16, basil unbound
//! - 5 boxes on hand: pasta clamps to 0 with variance 3 (30%)
//! - suggested count follows the scarcest bound ingredient
//! - the log records start, one deduction per item, completion

use fbr_schemas::LogKind;
use fbr_testkit::{pantry, Harness, FOOD_BANK, PASTA_ID, SAUCE_ID};

#[tokio::test]
async fn full_stock_deducts_scaled_need() {
    let h = Harness::new(pantry(100, 20)).await;
    let started = h.start_pasta("recipe-pasta-bake", 50).await.unwrap();
    let usage = &started.session.ingredient_usage;
    assert_eq!(usage.len(), 3);
    assert_eq!(usage[0].inventory_item_id.as_deref(), Some(PASTA_ID));
    assert_eq!(usage[1].inventory_item_id.as_deref(), Some(SAUCE_ID));
    assert_eq!(usage[2].inventory_item_id, None);

    let out = h.service.complete(started.session.id, 10).await.unwrap();

    assert_eq!(out.session.distributed_meal_count, Some(40));
    assert_eq!(out.usage_ratio, 0.8);
    assert!(!out.has_variance);
    assert!(out.warnings.is_empty(), "{:?}", out.warnings);

    assert_eq!(h.quantity(PASTA_ID).await, Some(92));
    // 4 * 0.8 = 3.2 rounds up
    assert_eq!(h.quantity(SAUCE_ID).await, Some(16));
    // other food bank untouched
    assert_eq!(h.quantity("inv-other").await, Some(500));

    let basil = &out.session.ingredient_usage[2];
    assert_eq!(basil.actual_quantity, Some(1));
    assert_eq!(basil.deducted_quantity, 0);
    assert!(!basil.deducted_from_inventory);

    assert_eq!(
        h.log_kinds().await,
        vec![
            LogKind::SessionStarted,
            LogKind::InventoryDeducted,
            LogKind::InventoryDeducted,
            LogKind::CountingCompleted,
        ]
    );
}

#[tokio::test]
async fn short_stock_clamps_and_records_variance() {
    let h = Harness::new(pantry(5, 20)).await;
    let started = h.start_pasta("recipe-pasta-bake", 50).await.unwrap();

    let out = h.service.complete(started.session.id, 10).await.unwrap();

    assert_eq!(h.quantity(PASTA_ID).await, Some(0));
    assert!(out.has_variance);

    let pasta = &out.session.ingredient_usage[0];
    assert_eq!(pasta.actual_quantity, Some(8));
    assert_eq!(pasta.deducted_quantity, 5);
    assert_eq!(pasta.variance, 3);
    assert_eq!(pasta.variance_percentage, 30.0);

    let d = out
        .deductions
        .iter()
        .find(|d| d.inventory_item_id == PASTA_ID)
        .unwrap();
    assert_eq!((d.quantity_before, d.quantity_after), (5, 0));

    let item = h.store.item(PASTA_ID).await.unwrap();
    assert_eq!(item.distributed_quantity, 5);
}

#[tokio::test]
async fn suggestion_and_shortages_follow_scarcest_item() {
    let h = Harness::new(pantry(5, 20)).await;
    let (recipe, _) = fbr_testkit::pasta_bake_recipe().unwrap();
    let resolved = h.service.resolve(FOOD_BANK, &recipe.ingredients).await.unwrap();

    // pasta 5/10, sauce 20/4: pasta limits the batch to half of 50
    let suggested = h
        .service
        .suggest(FOOD_BANK, &resolved, &recipe.servings)
        .await
        .unwrap();
    assert_eq!(suggested, 25);

    let shortages = h.service.availability(FOOD_BANK, &resolved).await.unwrap();
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].inventory_item_id, PASTA_ID);
    assert_eq!(shortages[0].available, 5);
}

#[tokio::test]
async fn nothing_left_over_consumes_full_batch() {
    let h = Harness::new(pantry(100, 20)).await;
    let started = h.start_pasta("recipe-pasta-bake", 50).await.unwrap();

    let out = h.service.complete(started.session.id, 0).await.unwrap();

    assert_eq!(out.session.distributed_meal_count, Some(50));
    assert_eq!(h.quantity(PASTA_ID).await, Some(90));
    assert_eq!(h.quantity(SAUCE_ID).await, Some(16));
}
