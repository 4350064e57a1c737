// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Kinds of HSE records that can be edited offline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The entity type a record and its operations belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Reported incident or near miss.
    Incident,
    /// Work permit.
    Permit,
    /// Failure mode and effects analysis.
    Fmea,
    /// Hazard and operability study.
    Hazop,
    /// Job safety analysis.
    Jsa,
    /// Layer of protection analysis.
    Lopa,
    /// Bow-tie risk diagram.
    BowTie,
    /// What-if analysis.
    WhatIf,
    /// Organization unit.
    Organization,
}

impl EntityType {
    /// All entity types, in display order.
    pub const ALL: [EntityType; 9] = [
        EntityType::Incident,
        EntityType::Permit,
        EntityType::Fmea,
        EntityType::Hazop,
        EntityType::Jsa,
        EntityType::Lopa,
        EntityType::BowTie,
        EntityType::WhatIf,
        EntityType::Organization,
    ];

    /// Returns the string representation used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Incident => "incident",
            EntityType::Permit => "permit",
            EntityType::Fmea => "fmea",
            EntityType::Hazop => "hazop",
            EntityType::Jsa => "jsa",
            EntityType::Lopa => "lopa",
            EntityType::BowTie => "bow_tie",
            EntityType::WhatIf => "what_if",
            EntityType::Organization => "organization",
        }
    }

    /// Short prefix used when generating local ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityType::Incident => "inc",
            EntityType::Permit => "prm",
            EntityType::Fmea => "fmea",
            EntityType::Hazop => "hzp",
            EntityType::Jsa => "jsa",
            EntityType::Lopa => "lopa",
            EntityType::BowTie => "btie",
            EntityType::WhatIf => "wif",
            EntityType::Organization => "org",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "incident" => Ok(EntityType::Incident),
            "permit" => Ok(EntityType::Permit),
            "fmea" => Ok(EntityType::Fmea),
            "hazop" => Ok(EntityType::Hazop),
            "jsa" => Ok(EntityType::Jsa),
            "lopa" => Ok(EntityType::Lopa),
            "bow_tie" | "bowtie" => Ok(EntityType::BowTie),
            "what_if" | "whatif" => Ok(EntityType::WhatIf),
            "organization" => Ok(EntityType::Organization),
            _ => Err(Error::InvalidEntityType(s.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
