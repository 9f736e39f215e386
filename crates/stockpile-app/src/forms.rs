// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::ids::ProductId;
use crate::price::{format_price_input, parse_price_cents};

pub const NAME_REQUIRED: &str = "Please enter a product name";
pub const PRICE_INVALID: &str = "Please enter a valid price";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductFormInput {
    pub name: String,
    pub price: String,
}

impl ProductFormInput {
    pub fn from_product(name: &str, price_cents: i64) -> Self {
        Self {
            name: name.to_owned(),
            price: format_price_input(price_cents),
        }
    }

    pub fn validate(&self) -> Result<ProductDraft> {
        let name = self.name.trim();
        if name.is_empty() {
            bail!(NAME_REQUIRED);
        }
        let Ok(price_cents) = parse_price_cents(&self.price) else {
            bail!(PRICE_INVALID);
        };
        Ok(ProductDraft {
            name: name.to_owned(),
            price_cents,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductWrite {
    Create(ProductDraft),
    Update { id: ProductId, draft: ProductDraft },
    Delete(ProductId),
}

impl ProductWrite {
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Create(_) => "add",
            Self::Update { .. } => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// A write tagged with the id its settlement will carry back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub request_id: u64,
    pub write: ProductWrite,
}

#[cfg(test)]
mod tests {
    use super::{NAME_REQUIRED, PRICE_INVALID, ProductFormInput, ProductWrite};
    use crate::ProductId;

    fn input(name: &str, price: &str) -> ProductFormInput {
        ProductFormInput {
            name: name.to_owned(),
            price: price.to_owned(),
        }
    }

    #[test]
    fn blank_name_is_rejected_with_user_message() {
        let error = input("   ", "5").validate().expect_err("blank name");
        assert_eq!(error.to_string(), NAME_REQUIRED);
    }

    #[test]
    fn bad_price_is_rejected_with_user_message() {
        for price in ["", "-3", "abc", "92233720368547758.99"] {
            let error = input("Lamp", price).validate().expect_err("bad price");
            assert_eq!(error.to_string(), PRICE_INVALID, "price {price:?}");
        }
    }

    #[test]
    fn valid_input_trims_name_and_converts_price() {
        let draft = input("  Lamp ", "12.5").validate().expect("valid");
        assert_eq!(draft.name, "Lamp");
        assert_eq!(draft.price_cents, 1250);
    }

    #[test]
    fn prefill_uses_plain_two_decimal_price() {
        let form = ProductFormInput::from_product("Lamp", 905);
        assert_eq!(form.price, "9.05");
        assert_eq!(form.validate().expect("round trip").price_cents, 905);
    }

    #[test]
    fn write_verbs_match_notices() {
        assert_eq!(ProductWrite::Delete(ProductId::new(1)).verb(), "delete");
    }
}
