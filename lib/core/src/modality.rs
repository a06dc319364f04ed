use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// One of the three independent feature spaces a post is scored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Metadata,
}

impl Modality {
    /// Fixed order used everywhere a modality triple is flattened.
    pub const ALL: [Modality; 3] = [Modality::Text, Modality::Image, Modality::Metadata];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Metadata => "metadata",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            "metadata" | "meta" => Ok(Modality::Metadata),
            other => Err(Error::Configuration(format!("unknown modality '{}'", other))),
        }
    }
}

/// A value held once per modality.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerModality<T> {
    pub text: T,
    pub image: T,
    pub metadata: T,
}

impl<T> PerModality<T> {
    pub fn new(text: T, image: T, metadata: T) -> Self {
        Self {
            text,
            image,
            metadata,
        }
    }

    pub fn get(&self, modality: Modality) -> &T {
        match modality {
            Modality::Text => &self.text,
            Modality::Image => &self.image,
            Modality::Metadata => &self.metadata,
        }
    }

    pub fn map<U, F: FnMut(Modality, &T) -> U>(&self, mut f: F) -> PerModality<U> {
        PerModality {
            text: f(Modality::Text, &self.text),
            image: f(Modality::Image, &self.image),
            metadata: f(Modality::Metadata, &self.metadata),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Modality, &T)> + '_ {
        Modality::ALL.into_iter().map(move |m| (m, self.get(m)))
    }

    pub fn into_array(self) -> [T; 3] {
        [self.text, self.image, self.metadata]
    }
}
