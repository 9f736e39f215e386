// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::path::PathBuf;
use stockpile_app::{Product, ProductDraft, ProductId};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const ADJECTIVES: [&str; 16] = [
    "Compact", "Deluxe", "Rugged", "Classic", "Portable", "Wireless", "Heavy-Duty", "Mini",
    "Smart", "Folding", "Stainless", "Bamboo", "Ceramic", "Cordless", "Premium", "Eco",
];

const NOUNS: [&str; 20] = [
    "Widget",
    "Gadget",
    "Kettle",
    "Lantern",
    "Stool",
    "Toolbox",
    "Blender",
    "Desk Lamp",
    "Thermos",
    "Umbrella",
    "Backpack",
    "Notebook",
    "Cutting Board",
    "Flashlight",
    "Speaker",
    "Tripod",
    "Rice Cooker",
    "Fan",
    "Organizer",
    "Water Filter",
];

const EDITIONS: [&str; 6] = ["Pro", "Plus", "Max", "Lite", "XL", "2.0"];

struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded product generator; the same seed always yields the same catalog.
pub struct ProductFaker {
    rng: DeterministicRng,
}

impl ProductFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn name(&mut self) -> String {
        let adjective = self.pick(&ADJECTIVES);
        let noun = self.pick(&NOUNS);
        if self.rng.int_n(4) == 0 {
            format!("{adjective} {noun} {}", self.pick(&EDITIONS))
        } else {
            format!("{adjective} {noun}")
        }
    }

    /// Prices land between 0.50 and 4,999.99, skewed toward whole-ish
    /// amounts the way shelf prices usually are.
    pub fn price_cents(&mut self) -> i64 {
        let whole = 1 + self.rng.int_n(4_999) as i64;
        let cents = match self.rng.int_n(3) {
            0 => 0,
            1 => 99,
            _ => self.rng.int_n(100) as i64,
        };
        (whole * 100 + cents).max(50)
    }

    pub fn draft(&mut self) -> ProductDraft {
        ProductDraft {
            name: self.name(),
            price_cents: self.price_cents(),
        }
    }

    pub fn drafts(&mut self, count: usize) -> Vec<ProductDraft> {
        (0..count).map(|_| self.draft()).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

/// A product as the store would report it. Larger ids are created later.
pub fn product(id: i64, name: &str, price_cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_owned(),
        price_cents,
        created_at: fixture_datetime() + Duration::seconds(id),
        updated_at: None,
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("stockpile.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

#[cfg(test)]
mod tests {
    use super::{ProductFaker, product};
    use std::collections::BTreeSet;
    use stockpile_app::ProductFormInput;

    #[test]
    fn same_seed_same_catalog() {
        let first = ProductFaker::new(11).drafts(20);
        let second = ProductFaker::new(11).drafts(20);
        assert_eq!(first, second);
    }

    #[test]
    fn zero_seed_is_usable() {
        let drafts = ProductFaker::new(0).drafts(3);
        assert_eq!(drafts, ProductFaker::new(1).drafts(3));
    }

    #[test]
    fn drafts_pass_form_validation() {
        let mut faker = ProductFaker::new(3);
        for draft in faker.drafts(200) {
            assert!(draft.price_cents >= 50, "price {}", draft.price_cents);
            let form = ProductFormInput::from_product(&draft.name, draft.price_cents);
            let validated = form.validate().expect("faker output validates");
            assert_eq!(validated, draft);
        }
    }

    #[test]
    fn variety_across_seeds() {
        let mut names = BTreeSet::new();
        for seed in 0_u64..20_u64 {
            names.insert(ProductFaker::new(seed).name());
        }
        assert!(names.len() >= 10, "got {}", names.len());
    }

    #[test]
    fn fixture_products_order_by_id() {
        let older = product(1, "A", 100);
        let newer = product(2, "B", 100);
        assert!(newer.created_at > older.created_at);
    }

    #[test]
    fn int_n() {
        let mut faker = ProductFaker::new(42);
        for _ in 0..100 {
            assert!(faker.int_n(5) < 5);
        }
    }
}
