use std::sync::Arc;

use color_eyre::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::assets::AssetCheck;
use crate::db::{Db, Image};
use crate::models::{ImageKind, ShownImages, TierFilter};
use crate::names;

#[derive(Debug, Clone, Serialize)]
pub struct ImagePair {
    pub real: Image,
    pub ai: Image,
}

/// A bonus round: one real image hidden among AI ones, already shuffled.
#[derive(Debug, Clone, Serialize)]
pub struct BonusImages {
    pub images: Vec<Image>,
    pub real_id: i64,
}

impl BonusImages {
    pub fn ids(&self) -> ShownImages {
        self.images.iter().map(|image| image.id).collect()
    }
}

/// Progressively looser candidate rules, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relaxation {
    Strict,
    RecentOnly,
    AnyTier,
}

const RELAXATIONS: [Relaxation; 3] = [
    Relaxation::Strict,
    Relaxation::RecentOnly,
    Relaxation::AnyTier,
];

#[derive(Clone)]
pub struct ImageSelector {
    db: Db,
    assets: Arc<dyn AssetCheck>,
}

impl ImageSelector {
    pub fn new(db: Db, assets: Arc<dyn AssetCheck>) -> Self {
        Self { db, assets }
    }

    /// Images stored under the kind's bucket whose asset file is present, lowest id first.
    async fn bucket(&self, kind: ImageKind) -> Result<Vec<Image>> {
        let images = self.db.images_in_bucket(kind).await?;
        Ok(images
            .into_iter()
            .filter(|image| self.assets.exists(&image.filename))
            .collect())
    }

    /// Whether both buckets hold at least one usable image in `filter`'s tier.
    pub async fn has_tier(&self, filter: TierFilter) -> Result<bool> {
        for kind in [ImageKind::Real, ImageKind::Ai] {
            let bucket = self.bucket(kind).await?;
            if !bucket.iter().any(|image| image.kind == kind && filter.admits(image.difficulty)) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Picks one real and one AI image the caller has not seen and records both in `shown`.
    ///
    /// `None` when either bucket has no usable image at all.
    pub async fn pick_pair<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        filter: TierFilter,
        shown: &mut ShownImages,
    ) -> Result<Option<ImagePair>> {
        let reals = self.bucket(ImageKind::Real).await?;
        let ais = self.bucket(ImageKind::Ai).await?;

        let Some(real) = choose(rng, &reals, ImageKind::Real, filter, shown, &[]) else {
            tracing::warn!("no real images available for {filter:?}");
            return Ok(None);
        };
        let Some(ai) = choose(rng, &ais, ImageKind::Ai, filter, shown, &[real]) else {
            tracing::warn!("no AI images available for {filter:?}");
            return Ok(None);
        };

        let pair = ImagePair {
            real: real.clone(),
            ai: ai.clone(),
        };
        shown.push(pair.real.id);
        shown.push(pair.ai.id);

        tracing::debug!(
            "picked pair real={} ai={} ({filter:?})",
            pair.real.filename,
            pair.ai.filename
        );
        Ok(Some(pair))
    }

    /// One real plus three AI images for a bonus round, in random order.
    pub async fn pick_bonus<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        filter: TierFilter,
        shown: &mut ShownImages,
    ) -> Result<Option<BonusImages>> {
        let reals = self.bucket(ImageKind::Real).await?;
        let ais = self.bucket(ImageKind::Ai).await?;

        let Some(real) = choose(rng, &reals, ImageKind::Real, filter, shown, &[]) else {
            return Ok(None);
        };

        let mut picked: Vec<&Image> = vec![real];
        for _ in 0..names::BONUS_AI_IMAGES {
            match choose(rng, &ais, ImageKind::Ai, filter, shown, &picked) {
                Some(ai) => picked.push(ai),
                None => {
                    tracing::warn!("not enough AI images for a bonus round");
                    return Ok(None);
                }
            }
        }

        let mut images: Vec<Image> = picked.into_iter().cloned().collect();
        let real_id = images[0].id;
        images.shuffle(rng);
        for image in &images {
            shown.push(image.id);
        }

        Ok(Some(BonusImages { images, real_id }))
    }
}

/// Walks the relaxation ladder over one bucket, then falls back to its lowest-id image.
///
/// `taken` images are never returned again and their filenames are avoided.
fn choose<'a, R: Rng + ?Sized>(
    rng: &mut R,
    bucket: &'a [Image],
    kind: ImageKind,
    filter: TierFilter,
    shown: &ShownImages,
    taken: &[&Image],
) -> Option<&'a Image> {
    let recent = shown.recent(names::RECENT_EXCLUSION_WINDOW);
    let free = |image: &Image| {
        !taken
            .iter()
            .any(|t| t.id == image.id || t.filename == image.filename)
    };

    for relaxation in RELAXATIONS {
        let tier: Vec<&Image> = bucket
            .iter()
            .filter(|image| free(*image))
            .filter(|image| match relaxation {
                Relaxation::Strict => filter.admits(image.difficulty) && !shown.contains(image.id),
                Relaxation::RecentOnly => {
                    filter.admits(image.difficulty) && !recent.contains(&image.id)
                }
                Relaxation::AnyTier => !recent.contains(&image.id),
            })
            .collect();

        if let Some(image) = checked_pick(rng, &tier, kind) {
            if relaxation != Relaxation::Strict {
                tracing::debug!("image pool relaxed to {relaxation:?} for {}", kind.as_str());
            }
            return Some(image);
        }
    }

    let fallback = bucket
        .iter()
        .find(|image| image.kind == kind && free(*image));
    if let Some(image) = fallback {
        tracing::warn!(
            "every {} image was excluded, reusing {}",
            kind.as_str(),
            image.filename
        );
    }
    fallback
}

/// Random pick whose recorded type must match the bucket it was found in.
fn checked_pick<'a, R: Rng + ?Sized>(
    rng: &mut R,
    tier: &[&'a Image],
    kind: ImageKind,
) -> Option<&'a Image> {
    let chosen = *tier.choose(rng)?;
    if chosen.kind == kind {
        return Some(chosen);
    }

    tracing::warn!(
        "image {} lives in the {} bucket but is recorded as {}; substituting",
        chosen.filename,
        kind.bucket(),
        chosen.kind.as_str()
    );
    let matching: Vec<&Image> = tier.iter().copied().filter(|i| i.kind == kind).collect();
    matching.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn image(id: i64, filename: &str, kind: ImageKind, difficulty: Option<Difficulty>) -> Image {
        Image {
            id,
            filename: filename.to_string(),
            kind,
            difficulty,
            category: None,
            description: None,
        }
    }

    fn reals() -> Vec<Image> {
        vec![
            image(1, "real/a.jpg", ImageKind::Real, Some(Difficulty::Easy)),
            image(2, "real/b.jpg", ImageKind::Real, Some(Difficulty::Medium)),
            image(3, "real/c.jpg", ImageKind::Real, Some(Difficulty::Hard)),
            image(4, "real/d.jpg", ImageKind::Real, None),
        ]
    }

    #[test]
    fn strict_tier_respects_filter_and_history() {
        let mut rng = StdRng::seed_from_u64(1);
        let bucket = reals();
        let shown = ShownImages::parse("1");
        for _ in 0..20 {
            let picked = choose(
                &mut rng,
                &bucket,
                ImageKind::Real,
                TierFilter::UpTo(Difficulty::Medium),
                &shown,
                &[],
            )
            .unwrap();
            assert_eq!(picked.id, 2);
        }
    }

    #[test]
    fn exhausted_tier_relaxes_to_recent_window() {
        let mut rng = StdRng::seed_from_u64(2);
        let bucket = reals();
        // Image 1 was shown long ago; only the last ten ids stay excluded.
        let shown: ShownImages = std::iter::once(1).chain(100..110).collect();
        let picked = choose(
            &mut rng,
            &bucket,
            ImageKind::Real,
            TierFilter::Exactly(Difficulty::Easy),
            &shown,
            &[],
        )
        .unwrap();
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn exhausted_difficulty_drops_filter() {
        let mut rng = StdRng::seed_from_u64(3);
        let bucket = reals();
        let shown = ShownImages::parse("1");
        let picked = choose(
            &mut rng,
            &bucket,
            ImageKind::Real,
            TierFilter::Exactly(Difficulty::Easy),
            &shown,
            &[],
        )
        .unwrap();
        assert_ne!(picked.id, 1);
    }

    #[test]
    fn everything_recent_falls_back_to_lowest_id() {
        let mut rng = StdRng::seed_from_u64(4);
        let bucket = reals();
        let shown = ShownImages::parse("1,2,3,4");
        let picked = choose(
            &mut rng,
            &bucket,
            ImageKind::Real,
            TierFilter::Any,
            &shown,
            &[],
        )
        .unwrap();
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn mislabeled_image_is_substituted() {
        let mut rng = StdRng::seed_from_u64(5);
        let bucket = vec![
            image(1, "real/a.jpg", ImageKind::Ai, Some(Difficulty::Easy)),
            image(2, "real/b.jpg", ImageKind::Real, Some(Difficulty::Easy)),
        ];
        for _ in 0..20 {
            let picked = choose(
                &mut rng,
                &bucket,
                ImageKind::Real,
                TierFilter::Any,
                &ShownImages::default(),
                &[],
            )
            .unwrap();
            assert_eq!(picked.id, 2);
        }
    }

    #[test]
    fn taken_images_are_never_repeated() {
        let mut rng = StdRng::seed_from_u64(6);
        let bucket = reals();
        let first = bucket[0].clone();
        for _ in 0..20 {
            let picked = choose(
                &mut rng,
                &bucket,
                ImageKind::Real,
                TierFilter::Any,
                &ShownImages::default(),
                &[&first],
            )
            .unwrap();
            assert_ne!(picked.filename, first.filename);
        }
    }

    #[test]
    fn empty_bucket_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(choose(
            &mut rng,
            &[],
            ImageKind::Ai,
            TierFilter::Any,
            &ShownImages::default(),
            &[]
        )
        .is_none());
    }
}
