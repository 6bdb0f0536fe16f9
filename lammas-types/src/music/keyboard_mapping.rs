use serde::{Deserialize, Serialize};

use crate::timebase::{KEYS_PER_CHANNEL, NUM_CHANNELS};

/// One cell of the remapping table: where a key ends up on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChannel {
    pub key: u8,
    /// MIDI channel in [1, 16].
    pub channel: u8,
}

impl KeyChannel {
    pub fn new(key: u8, channel: u8) -> Self {
        Self { key, channel }
    }

    fn to_compact(self) -> String {
        format!("{}/{}", self.key, self.channel)
    }

    fn from_compact(text: &str) -> Option<Self> {
        let (key, channel) = text.split_once('/')?;
        let channel: u8 = channel.trim().parse().ok()?;
        if channel < 1 || channel as usize > NUM_CHANNELS {
            return None;
        }
        Some(Self {
            key: key.trim().parse().ok()?,
            channel,
        })
    }
}

/// Total number of addressable source keys: temperaments with long periods
/// overflow the 128-key range and spill onto further channels.
pub const NUM_MAPPED_KEYS: usize = NUM_CHANNELS * KEYS_PER_CHANNEL;

/// A remapping table from (source key, source channel) to (key, channel),
/// consulted at MIDI export and playback time only; the model itself always
/// works in extended key space.
///
/// The default mapping folds extended key `k` to `(k % 128, k / 128 + 1)`,
/// which is the identity on channel 1 for the first 128 keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "KeyboardMappingWire", into = "KeyboardMappingWire")]
pub struct KeyboardMapping {
    name: String,
    table: Vec<KeyChannel>,
}

impl KeyboardMapping {
    pub fn new() -> Self {
        let mut table = Vec::with_capacity(NUM_MAPPED_KEYS * NUM_CHANNELS);
        for key in 0..NUM_MAPPED_KEYS {
            for _ in 0..NUM_CHANNELS {
                table.push(Self::default_mapping_for(key));
            }
        }
        Self {
            name: String::new(),
            table,
        }
    }

    fn default_mapping_for(key: usize) -> KeyChannel {
        KeyChannel {
            key: (key % KEYS_PER_CHANNEL) as u8,
            channel: (key / KEYS_PER_CHANNEL + 1) as u8,
        }
    }

    #[inline]
    fn index(key: usize, channel: u8) -> usize {
        key * NUM_CHANNELS + (channel as usize - 1)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Remaps a (key, channel) pair; out-of-range input falls back to the
    /// default mapping rather than failing.
    pub fn map(&self, key: i32, channel: u8) -> KeyChannel {
        debug_assert!(key >= 0 && (key as usize) < NUM_MAPPED_KEYS);
        debug_assert!(channel >= 1 && channel as usize <= NUM_CHANNELS);
        let key = key.max(0) as usize;
        if key >= NUM_MAPPED_KEYS || channel < 1 || channel as usize > NUM_CHANNELS {
            return Self::default_mapping_for(key % NUM_MAPPED_KEYS);
        }
        self.table[Self::index(key, channel)]
    }

    pub fn update_key(&mut self, key: i32, channel: u8, mapped: KeyChannel) {
        if key < 0
            || key as usize >= NUM_MAPPED_KEYS
            || channel < 1
            || channel as usize > NUM_CHANNELS
        {
            return;
        }
        self.table[Self::index(key as usize, channel)] = mapped;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_default(&self) -> bool {
        self.table
            .iter()
            .enumerate()
            .all(|(i, kc)| *kc == Self::default_mapping_for(i / NUM_CHANNELS))
    }

    /// Compact form listing only the entries that differ from the default,
    /// e.g. "60/1:72/2,61/1:73/2". The source key is the full extended
    /// index. Empty for a default mapping.
    pub fn to_mapping_string(&self) -> String {
        let mut out = Vec::new();
        for key in 0..NUM_MAPPED_KEYS {
            for channel in 1..=NUM_CHANNELS as u8 {
                let mapped = self.table[Self::index(key, channel)];
                if mapped != Self::default_mapping_for(key) {
                    out.push(format!("{}/{}:{}", key, channel, mapped.to_compact()));
                }
            }
        }
        out.join(",")
    }

    /// Parses the `to_mapping_string` form on top of the current table.
    /// Malformed entries are skipped.
    pub fn load_mapping_string(&mut self, text: &str) {
        for entry in text.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let Some((source, target)) = entry.split_once(':') else {
                continue;
            };
            let Some((source_key, source_channel)) = source.split_once('/') else {
                continue;
            };
            let (Ok(source_key), Ok(source_channel)) = (
                source_key.trim().parse::<i32>(),
                source_channel.trim().parse::<u8>(),
            ) else {
                continue;
            };
            if source_channel < 1 || source_channel as usize > NUM_CHANNELS {
                continue;
            }
            let Some(target) = KeyChannel::from_compact(target) else {
                continue;
            };
            self.update_key(source_key, source_channel, target);
        }
    }

    /// Imports a Scala .kbm mapping into the given source channel. Does not
    /// reset first: multi-channel keyboards come as one file per channel.
    ///
    /// The format is line-based; lines starting with '!' are comments. The
    /// header carries (in order) the map size, the first and last retuned
    /// keys, the middle note, a reference note and frequency, and the
    /// formal octave degree; then one mapping line per scale degree, where
    /// 'x' leaves the key unmapped.
    pub fn load_scala_kbm(&mut self, content: &str, channel: u8) -> bool {
        let mut numbers = Vec::new();
        let mut degrees: Vec<Option<i32>> = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('!') {
                continue;
            }
            let token = line.split_whitespace().next().unwrap_or("");
            if numbers.len() < 7 {
                match token.parse::<f64>() {
                    Ok(value) => numbers.push(value),
                    Err(_) => return false,
                }
            } else if token.eq_ignore_ascii_case("x") {
                degrees.push(None);
            } else {
                match token.parse::<i32>() {
                    Ok(value) => degrees.push(Some(value)),
                    Err(_) => return false,
                }
            }
        }

        if numbers.len() < 7 {
            return false;
        }

        let map_size = numbers[0] as i32;
        let first = numbers[1] as i32;
        let last = numbers[2] as i32;
        let middle = numbers[3] as i32;
        let octave_degree = numbers[6] as i32;
        if map_size <= 0 || degrees.len() as i32 > map_size {
            return false;
        }

        for key in first.max(0)..=last {
            let offset = key - middle;
            let degree_index = offset.rem_euclid(map_size);
            let octave = offset.div_euclid(map_size);
            if let Some(Some(degree)) = degrees.get(degree_index as usize) {
                let target = middle + octave * octave_degree + degree;
                if (0..KEYS_PER_CHANNEL as i32).contains(&target) {
                    self.update_key(key, channel, KeyChannel::new(target as u8, channel));
                }
            }
        }

        true
    }
}

impl Default for KeyboardMapping {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize, Deserialize)]
struct KeyboardMappingWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    map: String,
}

impl From<KeyboardMappingWire> for KeyboardMapping {
    fn from(wire: KeyboardMappingWire) -> Self {
        let mut mapping = KeyboardMapping::new();
        mapping.name = wire.name;
        mapping.load_mapping_string(&wire.map);
        mapping
    }
}

impl From<KeyboardMapping> for KeyboardMappingWire {
    fn from(mapping: KeyboardMapping) -> Self {
        Self {
            map: mapping.to_mapping_string(),
            name: mapping.name,
        }
    }
}
