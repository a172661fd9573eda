mod common;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use realvsai::assets::{AllAssets, AssetCheck};
use realvsai::models::{Difficulty, ImageKind, ShownImages, TierFilter};
use realvsai::services::images::ImageSelector;

use common::{create_test_db, seed_images};

/// Pretends every file except the listed ones was deleted from disk.
struct OnlyFiles(Vec<String>);

impl AssetCheck for OnlyFiles {
    fn exists(&self, filename: &str) -> bool {
        self.0.iter().any(|f| f == filename)
    }
}

#[tokio::test]
async fn test_pair_is_one_real_one_ai_in_tier() {
    let db = create_test_db().await;
    seed_images(&db, 3).await;
    let selector = ImageSelector::new(db, Arc::new(AllAssets));
    let mut rng = StdRng::seed_from_u64(1);
    let mut shown = ShownImages::default();

    for _ in 0..3 {
        let pair = selector
            .pick_pair(&mut rng, TierFilter::UpTo(Difficulty::Easy), &mut shown)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pair.real.kind, ImageKind::Real);
        assert_eq!(pair.ai.kind, ImageKind::Ai);
        assert_eq!(pair.real.difficulty, Some(Difficulty::Easy));
        assert_eq!(pair.ai.difficulty, Some(Difficulty::Easy));
    }

    // Three easy pairs exhaust the tier without repeats.
    let mut ids = shown.ids().to_vec();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 6);
}

#[tokio::test]
async fn test_exhausted_pool_still_returns_pair() {
    let db = create_test_db().await;
    seed_images(&db, 1).await;
    let selector = ImageSelector::new(db, Arc::new(AllAssets));
    let mut rng = StdRng::seed_from_u64(2);
    let mut shown = ShownImages::default();

    for _ in 0..10 {
        let pair = selector
            .pick_pair(&mut rng, TierFilter::Exactly(Difficulty::Hard), &mut shown)
            .await
            .unwrap();
        let pair = pair.expect("fallback should always find a pair");
        assert_ne!(pair.real.id, pair.ai.id);
    }
    assert_eq!(shown.len(), 20);
}

#[tokio::test]
async fn test_missing_files_are_skipped() {
    let db = create_test_db().await;
    seed_images(&db, 2).await;
    let assets = OnlyFiles(vec![
        "real/medium_1.jpg".to_string(),
        "ai/hard_0.jpg".to_string(),
    ]);
    let selector = ImageSelector::new(db, Arc::new(assets));
    let mut rng = StdRng::seed_from_u64(3);
    let mut shown = ShownImages::default();

    let pair = selector
        .pick_pair(&mut rng, TierFilter::Any, &mut shown)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pair.real.filename, "real/medium_1.jpg");
    assert_eq!(pair.ai.filename, "ai/hard_0.jpg");
}

#[tokio::test]
async fn test_empty_bucket_gives_no_pair() {
    let db = create_test_db().await;
    db.insert_image("real/only.jpg", ImageKind::Real, Some(Difficulty::Easy), None, None)
        .await
        .unwrap();
    let selector = ImageSelector::new(db, Arc::new(AllAssets));
    let mut rng = StdRng::seed_from_u64(4);
    let mut shown = ShownImages::default();

    let pair = selector
        .pick_pair(&mut rng, TierFilter::Any, &mut shown)
        .await
        .unwrap();
    assert!(pair.is_none());
    assert!(shown.is_empty());
}

#[tokio::test]
async fn test_mislabeled_image_is_substituted() {
    let db = create_test_db().await;
    // Stored under real/ but recorded as AI.
    db.insert_image("real/liar.jpg", ImageKind::Ai, Some(Difficulty::Easy), None, None)
        .await
        .unwrap();
    db.insert_image("real/honest.jpg", ImageKind::Real, Some(Difficulty::Easy), None, None)
        .await
        .unwrap();
    db.insert_image("ai/fake.jpg", ImageKind::Ai, Some(Difficulty::Easy), None, None)
        .await
        .unwrap();
    let selector = ImageSelector::new(db, Arc::new(AllAssets));

    for seed in 0..10 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut shown = ShownImages::default();
        let pair = selector
            .pick_pair(&mut rng, TierFilter::Any, &mut shown)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pair.real.filename, "real/honest.jpg");
        assert_eq!(pair.ai.filename, "ai/fake.jpg");
    }
}

#[tokio::test]
async fn test_bonus_has_one_real_three_ai() {
    let db = create_test_db().await;
    seed_images(&db, 2).await;
    let selector = ImageSelector::new(db, Arc::new(AllAssets));
    let mut rng = StdRng::seed_from_u64(5);
    let mut shown = ShownImages::default();

    let bonus = selector
        .pick_bonus(&mut rng, TierFilter::UpTo(Difficulty::Medium), &mut shown)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bonus.images.len(), 4);
    let reals: Vec<_> = bonus
        .images
        .iter()
        .filter(|i| i.kind == ImageKind::Real)
        .collect();
    assert_eq!(reals.len(), 1);
    assert_eq!(reals[0].id, bonus.real_id);
    assert_eq!(shown.len(), 4);
}

#[tokio::test]
async fn test_has_tier_needs_both_kinds() {
    let db = create_test_db().await;
    db.insert_image("real/easy.jpg", ImageKind::Real, Some(Difficulty::Easy), None, None)
        .await
        .unwrap();
    db.insert_image("ai/easy.jpg", ImageKind::Ai, Some(Difficulty::Easy), None, None)
        .await
        .unwrap();
    db.insert_image("ai/hard.jpg", ImageKind::Ai, Some(Difficulty::Hard), None, None)
        .await
        .unwrap();
    let selector = ImageSelector::new(db, Arc::new(AllAssets));

    assert!(selector.has_tier(TierFilter::UpTo(Difficulty::Easy)).await.unwrap());
    assert!(!selector.has_tier(TierFilter::Exactly(Difficulty::Hard)).await.unwrap());
}
