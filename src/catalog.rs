//! The studio's bookable service packages.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{AddonChoice, BookingCartItem, TierChoice};

const BUNDLED_PACKAGES: &str = include_str!("../catalog/packages.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub payment_terms: Vec<String>,
    pub tiers: Vec<TierChoice>,
    #[serde(default)]
    pub addons: Vec<AddonChoice>,
}

impl Package {
    /// The tier preselected on the detail view: the middle of the range when
    /// there is one, otherwise the only tier.
    pub fn default_tier(&self) -> Option<&TierChoice> {
        if self.tiers.len() > 1 {
            self.tiers.get(1)
        } else {
            self.tiers.first()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    packages: Vec<Package>,
}

impl Catalog {
    pub fn bundled() -> Result<Self, serde_json::Error> {
        Self::from_json(BUNDLED_PACKAGES)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            packages: serde_json::from_str(json)?,
        })
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package(&self, id: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// Build a priced cart line from catalog ids. Prices always come from the
    /// catalog; repeated add-on ids count once.
    pub fn price_selection(
        &self,
        package_id: &str,
        tier_id: Option<&str>,
        addon_ids: &[String],
    ) -> Result<BookingCartItem, AppError> {
        let package = self.package(package_id).ok_or(AppError::NotFound)?;

        let tier = match tier_id {
            Some(tier_id) => package
                .tiers
                .iter()
                .find(|t| t.id == tier_id)
                .ok_or_else(|| AppError::validation(format!("unknown tier '{tier_id}'")))?,
            None => package
                .default_tier()
                .ok_or_else(|| AppError::validation("package has no tiers"))?,
        };

        let mut addons: Vec<AddonChoice> = Vec::with_capacity(addon_ids.len());
        for addon_id in addon_ids {
            if addons.iter().any(|a| &a.id == addon_id) {
                continue;
            }
            let addon = package
                .addons
                .iter()
                .find(|a| &a.id == addon_id)
                .ok_or_else(|| AppError::validation(format!("unknown add-on '{addon_id}'")))?;
            addons.push(addon.clone());
        }

        Ok(BookingCartItem::priced(
            package.id.clone(),
            package.title.clone(),
            tier.clone(),
            addons,
        ))
    }
}
