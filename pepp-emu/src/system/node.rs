//! system description nodes

use serde::{Deserialize, Serialize};

/// backing store for a memory-like node
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    #[default]
    Dense,
    Mmi,
    Mmo,
    /// routes accesses to the targets named in `regions`
    Bus,
}

/// a window of a bus mapped onto another target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegionDescriptor {
    pub target: String,
    #[serde(with = "offset")]
    pub min_offset: u64,
    #[serde(with = "offset")]
    pub max_offset: u64,
}

/// one device in a system description
///
/// offsets may be written as integers or as strings such as `"0xffff"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeDescriptor {
    pub name: String,
    pub compatible: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor: Option<String>,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default, with = "offset")]
    pub min_offset: u64,
    #[serde(default, with = "offset")]
    pub max_offset: u64,
    #[serde(default)]
    pub default_value: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<String>,
    /// full path of the device an initiator issues accesses against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<RegionDescriptor>,
}

impl NodeDescriptor {
    pub fn new(name: impl Into<String>, compatible: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            compatible: compatible.into(),
            processor: None,
            storage: Storage::default(),
            min_offset: 0,
            max_offset: 0,
            default_value: 0,
            clock: None,
            target: None,
            regions: Vec::new(),
        }
    }

    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = Some(processor.into());
        self
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_range(mut self, min_offset: u64, max_offset: u64) -> Self {
        self.min_offset = min_offset;
        self.max_offset = max_offset;
        self
    }

    pub fn with_clock(mut self, clock: impl Into<String>) -> Self {
        self.clock = Some(clock.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_region(
        mut self,
        target: impl Into<String>,
        min_offset: u64,
        max_offset: u64,
    ) -> Self {
        self.regions.push(RegionDescriptor {
            target: target.into(),
            min_offset,
            max_offset,
        });
        self
    }

    /// parse a sequence of nodes
    pub fn from_yaml(yaml: &str) -> Result<Vec<Self>, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

mod offset {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Int(u64),
        Str(String),
    }

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:#x}", value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Repr::deserialize(deserializer)? {
            Repr::Int(value) => Ok(value),
            Repr::Str(text) => {
                let text = text.trim();
                let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => text.parse(),
                };
                parsed.map_err(|e| D::Error::custom(format!("invalid offset `{}`: {}", text, e)))
            }
        }
    }
}
