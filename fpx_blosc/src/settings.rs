use std::collections::BTreeMap;
use std::fmt;

use fpx_core::{CompressParams, Compressor, ShuffleMode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::{CONFIG_COMPRESSOR, CONFIG_LEVEL, CONFIG_SHUFFLE, CONFIG_THREADS};

pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 9;
/// Thread count substituted for a request above the codec's limit.
pub const FALLBACK_THREADS: u32 = 8;

const WRONG_TYPE: &str = "Unsupported value type, setting unchanged";

/// One complete parameter set for the codec.
///
/// `type_size` and `uncompressed_size` are filled in per frame; the other
/// fields are commanded over the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub compressor: Compressor,
    pub level: i32,
    pub shuffle: ShuffleMode,
    pub type_size: usize,
    pub uncompressed_size: usize,
    pub threads: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            compressor: Compressor::Lz4,
            level: MIN_LEVEL,
            shuffle: ShuffleMode::Bit,
            type_size: 0,
            uncompressed_size: 0,
            threads: 1,
        }
    }
}

impl CompressionSettings {
    pub fn params(&self) -> CompressParams {
        CompressParams {
            level: self.level,
            shuffle: self.shuffle,
            type_size: self.type_size,
        }
    }
}

impl fmt::Display for CompressionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compressor={} threads={} clevel={} doshuffle={} typesize={} nbytes={}",
            self.compressor,
            self.threads,
            self.level,
            self.shuffle.code(),
            self.type_size,
            self.uncompressed_size
        )
    }
}

/// Warnings produced while validating a configuration update, keyed
/// `"warning: <field>"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigReply {
    warnings: BTreeMap<String, Value>,
}

impl ConfigReply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning(&mut self, field: &str, value: impl Into<Value>) {
        self.warnings.insert(format!("warning: {field}"), value.into());
    }

    /// Warning recorded for `field`, if any.
    pub fn warning(&self, field: &str) -> Option<&Value> {
        self.warnings.get(&format!("warning: {field}"))
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.warnings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.warnings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Validate `update` against `current` and return the resulting settings.
///
/// Out-of-range values are clamped and reported in `reply`; fields of the
/// wrong type keep their current value. Keys other than the four control
/// fields are ignored.
pub fn apply_update(
    current: &CompressionSettings,
    update: &Map<String, Value>,
    max_threads: u32,
    reply: &mut ConfigReply,
) -> CompressionSettings {
    let mut next = *current;

    if let Some(value) = update.get(CONFIG_LEVEL) {
        match as_integer(value) {
            Some(level) if level < MIN_LEVEL as i64 => {
                warn!(requested = level, applied = MIN_LEVEL, "compression level below range");
                next.level = MIN_LEVEL;
                reply.add_warning(CONFIG_LEVEL, format!("Capped at lower range: {MIN_LEVEL}"));
            }
            Some(level) if level > MAX_LEVEL as i64 => {
                warn!(requested = level, applied = MAX_LEVEL, "compression level above range");
                next.level = MAX_LEVEL;
                reply.add_warning(CONFIG_LEVEL, format!("Capped at upper range: {MAX_LEVEL}"));
            }
            Some(level) => next.level = level as i32,
            None => wrong_type(CONFIG_LEVEL, value, reply),
        }
    }

    if let Some(value) = update.get(CONFIG_SHUFFLE) {
        match as_integer(value) {
            Some(code) => match ShuffleMode::from_code(code) {
                Some(shuffle) => next.shuffle = shuffle,
                None => {
                    warn!(requested = code, "invalid shuffle filter, shuffle disabled");
                    next.shuffle = ShuffleMode::NoShuffle;
                    reply.add_warning(CONFIG_SHUFFLE, "Disabled");
                }
            },
            None => wrong_type(CONFIG_SHUFFLE, value, reply),
        }
    }

    if let Some(value) = update.get(CONFIG_THREADS) {
        match value.as_u64() {
            Some(0) => {
                warn!("thread count of 0 requested, using 1");
                next.threads = 1;
                reply.add_warning(CONFIG_THREADS, 1);
            }
            Some(threads) if threads > max_threads as u64 => {
                let applied = FALLBACK_THREADS.min(max_threads);
                warn!(requested = threads, max = max_threads, applied, "too many codec threads");
                next.threads = applied;
                reply.add_warning(CONFIG_THREADS, applied);
            }
            Some(threads) => next.threads = threads as u32,
            None => wrong_type(CONFIG_THREADS, value, reply),
        }
    }

    if let Some(value) = update.get(CONFIG_COMPRESSOR) {
        match as_integer(value) {
            Some(code) => match Compressor::from_code(code) {
                Some(compressor) => next.compressor = compressor,
                None => {
                    let fallback = Compressor::default();
                    warn!(requested = code, applied = %fallback, "unsupported compressor");
                    next.compressor = fallback;
                    reply.add_warning(CONFIG_COMPRESSOR, fallback.code());
                }
            },
            None => wrong_type(CONFIG_COMPRESSOR, value, reply),
        }
    }

    next
}

/// Integer view of `value`. Unsigned values beyond `i64::MAX` saturate so
/// they are handled as out of range rather than as the wrong type.
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_u64().map(|_| i64::MAX))
}

fn wrong_type(field: &str, value: &Value, reply: &mut ConfigReply) {
    warn!(field, %value, "ignoring configuration value of unsupported type");
    reply.add_warning(field, WRONG_TYPE);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: Value) -> (CompressionSettings, ConfigReply) {
        let mut reply = ConfigReply::new();
        let map = value.as_object().cloned().unwrap_or_default();
        let next = apply_update(&CompressionSettings::default(), &map, 256, &mut reply);
        (next, reply)
    }

    #[test]
    fn defaults() {
        let s = CompressionSettings::default();
        assert_eq!(s.compressor, Compressor::Lz4);
        assert_eq!(s.shuffle, ShuffleMode::Bit);
        assert_eq!((s.level, s.threads, s.type_size, s.uncompressed_size), (1, 1, 0, 0));
    }

    #[test]
    fn valid_update_applies_without_warnings() {
        let (s, reply) = update(json!({"level": 5, "shuffle": 1, "threads": 4, "compressor": 5}));
        assert!(reply.is_empty());
        assert_eq!(s.level, 5);
        assert_eq!(s.shuffle, ShuffleMode::Byte);
        assert_eq!(s.threads, 4);
        assert_eq!(s.compressor, Compressor::Zstd);
    }

    #[test]
    fn level_is_clamped_with_warning() {
        let (s, reply) = update(json!({"level": 15}));
        assert_eq!(s.level, 9);
        assert_eq!(reply.warning("level"), Some(&json!("Capped at upper range: 9")));

        let (s, reply) = update(json!({"level": 0}));
        assert_eq!(s.level, 1);
        assert_eq!(reply.warning("level"), Some(&json!("Capped at lower range: 1")));
    }

    #[test]
    fn invalid_shuffle_disables_filter() {
        let (s, reply) = update(json!({"shuffle": 99}));
        assert_eq!(s.shuffle, ShuffleMode::NoShuffle);
        assert_eq!(reply.warning("shuffle"), Some(&json!("Disabled")));
    }

    #[test]
    fn threads_above_limit_fall_back() {
        let (s, reply) = update(json!({"threads": 1000}));
        assert_eq!(s.threads, 8);
        assert_eq!(reply.warning("threads"), Some(&json!(8)));

        let (s, reply) = update(json!({"threads": 0}));
        assert_eq!(s.threads, 1);
        assert_eq!(reply.warning("threads"), Some(&json!(1)));
    }

    #[test]
    fn unsupported_compressor_falls_back_to_lz4() {
        for code in [0, 2, 3, 6, -4] {
            let mut reply = ConfigReply::new();
            let start = CompressionSettings { compressor: Compressor::Zlib, ..Default::default() };
            let map = json!({"compressor": code}).as_object().cloned().unwrap();
            let s = apply_update(&start, &map, 256, &mut reply);
            assert_eq!(s.compressor, Compressor::Lz4, "code {code}");
            assert_eq!(reply.warning("compressor"), Some(&json!(1)));
        }
    }

    #[test]
    fn wrong_type_leaves_field_unchanged() {
        let (s, reply) = update(json!({"level": "high", "threads": -3, "shuffle": 1}));
        assert_eq!(s.level, 1);
        assert_eq!(s.threads, 1);
        assert_eq!(s.shuffle, ShuffleMode::Byte);
        assert!(reply.warning("level").is_some());
        assert!(reply.warning("threads").is_some());
        assert!(reply.warning("shuffle").is_none());
    }

    #[test]
    fn huge_unsigned_values_are_out_of_range() {
        let start = CompressionSettings {
            compressor: Compressor::Zstd,
            level: 5,
            shuffle: ShuffleMode::Byte,
            ..Default::default()
        };
        let map = json!({"shuffle": u64::MAX, "level": u64::MAX, "compressor": u64::MAX})
            .as_object()
            .cloned()
            .unwrap();
        let mut reply = ConfigReply::new();
        let s = apply_update(&start, &map, 256, &mut reply);

        assert_eq!(s.shuffle, ShuffleMode::NoShuffle);
        assert_eq!(s.level, 9);
        assert_eq!(s.compressor, Compressor::Lz4);
        assert_eq!(reply.warning("shuffle"), Some(&json!("Disabled")));
        assert_eq!(reply.warning("level"), Some(&json!("Capped at upper range: 9")));
        assert_eq!(reply.warning("compressor"), Some(&json!(1)));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let (s, reply) = update(json!({"colour": "blue", "level": 3}));
        assert!(reply.is_empty());
        assert_eq!(s.level, 3);
    }

    #[test]
    fn reply_serializes_as_flat_object() {
        let (_, reply) = update(json!({"level": 20, "shuffle": 7}));
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"warning: level": "Capped at upper range: 9", "warning: shuffle": "Disabled"})
        );
        assert_eq!(reply.to_json(), serde_json::to_value(&reply).unwrap());
        assert_eq!(reply.len(), 2);
    }

    #[test]
    fn display_lists_parameters() {
        let s = CompressionSettings { type_size: 2, uncompressed_size: 4096, ..Default::default() };
        assert_eq!(
            s.to_string(),
            "compressor=lz4 threads=1 clevel=1 doshuffle=2 typesize=2 nbytes=4096"
        );
    }
}
