use crate::android::chunk::ChunkReader;
use crate::android::error::ResResult;
use log::warn;
use nom::bytes::complete::take;
use nom::combinator::map_res;
use nom::number::complete::{le_u16, le_u8};
use nom::IResult;
use serde::Serialize;
use std::fmt;

/// Size of the largest `ResTable_config` layout this decoder knows,
/// including the leading size field.
pub const KNOWN_CONFIG_SIZE: usize = 64;

pub const ORIENTATION_PORT: u8 = 0x01;
pub const ORIENTATION_LAND: u8 = 0x02;
pub const ORIENTATION_SQUARE: u8 = 0x03;

pub const DENSITY_DEFAULT: u16 = 0;
pub const DENSITY_LOW: u16 = 120;
pub const DENSITY_MEDIUM: u16 = 160;
pub const DENSITY_TV: u16 = 213;
pub const DENSITY_HIGH: u16 = 240;
pub const DENSITY_XHIGH: u16 = 320;
pub const DENSITY_XXHIGH: u16 = 480;
pub const DENSITY_XXXHIGH: u16 = 640;
pub const DENSITY_ANY: u16 = 0xFFFE;
pub const DENSITY_NONE: u16 = 0xFFFF;

const MASK_KEYSHIDDEN: u8 = 0x03;
const MASK_NAVHIDDEN: u8 = 0x0C;
const MASK_GRAMMATICAL_GENDER: u8 = 0x03;

const MASK_SCREENSIZE: u8 = 0x0F;
const MASK_SCREENLONG: u8 = 0x30;
const MASK_LAYOUTDIR: u8 = 0xC0;
const MASK_UI_MODE_TYPE: u8 = 0x0F;
const MASK_UI_MODE_NIGHT: u8 = 0x30;
const MASK_SCREENROUND: u8 = 0x03;
const MASK_WIDE_COLOR_GAMUT: u8 = 0x03;
const MASK_HDR: u8 = 0x0C;

/// A decoded `ResTable_config`: the device conditions a resource value
/// applies under. Zero in any field means "any".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Configuration {
    pub mcc: u16,
    pub mnc: u16,
    pub language: [u8; 2],
    pub country: [u8; 2],
    pub orientation: u8,
    pub touchscreen: u8,
    pub density: u16,
    pub keyboard: u8,
    pub navigation: u8,
    pub input_flags: u8,
    pub grammatical_inflection: u8,
    pub screen_width: u16,
    pub screen_height: u16,
    pub sdk_version: u16,
    pub minor_version: u16,
    pub screen_layout: u8,
    pub ui_mode: u8,
    pub smallest_screen_width_dp: u16,
    pub screen_width_dp: u16,
    pub screen_height_dp: u16,
    pub locale_script: [u8; 4],
    pub locale_variant: [u8; 8],
    pub screen_layout2: u8,
    pub color_mode: u8,
    pub locale_script_was_computed: bool,
    pub locale_numbering_system: [u8; 8],
    /// Bytes past [`KNOWN_CONFIG_SIZE`], written by a newer toolchain.
    pub unknown: Vec<u8>,
}

fn array<const N: usize>(input: &[u8]) -> IResult<&[u8], [u8; N]> {
    map_res(take(N), |bytes: &[u8]| <[u8; N]>::try_from(bytes))(input)
}

/// Field layout after the leading size field; `input` is always zero-padded
/// to the full known layout.
fn config_fields(input: &[u8]) -> IResult<&[u8], Configuration> {
    let (input, mcc) = le_u16(input)?;
    let (input, mnc) = le_u16(input)?;
    let (input, language) = array::<2>(input)?;
    let (input, country) = array::<2>(input)?;
    let (input, orientation) = le_u8(input)?;
    let (input, touchscreen) = le_u8(input)?;
    let (input, density) = le_u16(input)?;
    let (input, keyboard) = le_u8(input)?;
    let (input, navigation) = le_u8(input)?;
    let (input, input_flags) = le_u8(input)?;
    let (input, grammatical_inflection) = le_u8(input)?;
    let (input, screen_width) = le_u16(input)?;
    let (input, screen_height) = le_u16(input)?;
    let (input, sdk_version) = le_u16(input)?;
    let (input, minor_version) = le_u16(input)?;
    let (input, screen_layout) = le_u8(input)?;
    let (input, ui_mode) = le_u8(input)?;
    let (input, smallest_screen_width_dp) = le_u16(input)?;
    let (input, screen_width_dp) = le_u16(input)?;
    let (input, screen_height_dp) = le_u16(input)?;
    let (input, locale_script) = array::<4>(input)?;
    let (input, locale_variant) = array::<8>(input)?;
    let (input, screen_layout2) = le_u8(input)?;
    let (input, color_mode) = le_u8(input)?;
    let (input, _screen_config_pad2) = le_u16(input)?;
    let (input, locale_script_was_computed) = le_u8(input)?;
    let (input, locale_numbering_system) = array::<8>(input)?;
    Ok((
        input,
        Configuration {
            mcc,
            mnc,
            language,
            country,
            orientation,
            touchscreen,
            density,
            keyboard,
            navigation,
            input_flags,
            grammatical_inflection,
            screen_width,
            screen_height,
            sdk_version,
            minor_version,
            screen_layout,
            ui_mode,
            smallest_screen_width_dp,
            screen_width_dp,
            screen_height_dp,
            locale_script,
            locale_variant,
            screen_layout2,
            color_mode,
            locale_script_was_computed: locale_script_was_computed != 0,
            locale_numbering_system,
            unknown: Vec::new(),
        },
    ))
}

impl Configuration {
    /// Reads a `ResTable_config` at the reader's position. The blob declares
    /// its own size; older, shorter layouts leave the missing fields at "any".
    pub fn parse(reader: &mut ChunkReader<'_>) -> ResResult<Self> {
        let offset = reader.position();
        let size = reader.read_u32()? as usize;
        if size < 4 {
            return Err(malformed!(offset, "configuration size {} is too small", size));
        }
        let body = reader.read_bytes(size - 4)?;

        let known = (KNOWN_CONFIG_SIZE - 4).min(body.len());
        let mut padded = [0u8; KNOWN_CONFIG_SIZE - 4];
        padded[..known].copy_from_slice(&body[..known]);
        let (_, mut config) = config_fields(&padded)
            .map_err(|err| malformed!(offset, "unreadable configuration: {}", err))?;

        if body.len() > known {
            warn!(
                "configuration at 0x{:x} is {} bytes, {} more than this decoder knows",
                offset,
                size,
                size - KNOWN_CONFIG_SIZE
            );
            config.unknown = body[known..].to_vec();
        }
        Ok(config)
    }

    /// True when every axis is "any". Unknown trailing bytes count only when
    /// they are nonzero.
    pub fn is_default(&self) -> bool {
        let known_default = Configuration {
            unknown: Vec::new(),
            ..self.clone()
        } == Configuration::default();
        known_default && self.unknown.iter().all(|b| *b == 0)
    }

    pub fn language(&self) -> Option<String> {
        unpack_language_or_region(self.language, b'a')
    }

    pub fn region(&self) -> Option<String> {
        unpack_language_or_region(self.country, b'0')
    }

    /// The qualifier string used for resource directory names, e.g.
    /// `en-rGB-hdpi-v21`. Empty for the default configuration.
    pub fn qualifiers(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if self.mcc != 0 {
            parts.push(format!("mcc{}", self.mcc));
        }
        if self.mnc != 0 {
            parts.push(format!("mnc{}", self.mnc));
        }
        if let Some(locale) = self.locale_qualifier() {
            parts.push(locale);
        }
        match self.grammatical_inflection & MASK_GRAMMATICAL_GENDER {
            0 => {}
            0x01 => parts.push("neuter".into()),
            0x02 => parts.push("feminine".into()),
            _ => parts.push("masculine".into()),
        }
        match self.screen_layout & MASK_LAYOUTDIR {
            0 => {}
            0x40 => parts.push("ldltr".into()),
            0x80 => parts.push("ldrtl".into()),
            v => parts.push(format!("layoutDir={}", v)),
        }
        if self.smallest_screen_width_dp != 0 {
            parts.push(format!("sw{}dp", self.smallest_screen_width_dp));
        }
        if self.screen_width_dp != 0 {
            parts.push(format!("w{}dp", self.screen_width_dp));
        }
        if self.screen_height_dp != 0 {
            parts.push(format!("h{}dp", self.screen_height_dp));
        }
        match self.screen_layout & MASK_SCREENSIZE {
            0 => {}
            0x01 => parts.push("small".into()),
            0x02 => parts.push("normal".into()),
            0x03 => parts.push("large".into()),
            0x04 => parts.push("xlarge".into()),
            v => parts.push(format!("screenLayoutSize={}", v)),
        }
        match self.screen_layout & MASK_SCREENLONG {
            0 => {}
            0x10 => parts.push("notlong".into()),
            0x20 => parts.push("long".into()),
            v => parts.push(format!("screenLayoutLong={}", v)),
        }
        match self.screen_layout2 & MASK_SCREENROUND {
            0 => {}
            0x01 => parts.push("notround".into()),
            0x02 => parts.push("round".into()),
            v => parts.push(format!("screenRound={}", v)),
        }
        match self.color_mode & MASK_WIDE_COLOR_GAMUT {
            0 => {}
            0x01 => parts.push("nowidecg".into()),
            0x02 => parts.push("widecg".into()),
            v => parts.push(format!("wideColorGamut={}", v)),
        }
        match self.color_mode & MASK_HDR {
            0 => {}
            0x04 => parts.push("lowdr".into()),
            0x08 => parts.push("highdr".into()),
            v => parts.push(format!("hdr={}", v)),
        }
        match self.orientation {
            0 => {}
            ORIENTATION_PORT => parts.push("port".into()),
            ORIENTATION_LAND => parts.push("land".into()),
            ORIENTATION_SQUARE => parts.push("square".into()),
            v => parts.push(format!("orientation={}", v)),
        }
        match self.ui_mode & MASK_UI_MODE_TYPE {
            // "normal" is the implicit UI mode and has no qualifier
            0 | 0x01 => {}
            0x02 => parts.push("desk".into()),
            0x03 => parts.push("car".into()),
            0x04 => parts.push("television".into()),
            0x05 => parts.push("appliance".into()),
            0x06 => parts.push("watch".into()),
            0x07 => parts.push("vrheadset".into()),
            v => parts.push(format!("uiModeType={}", v)),
        }
        match self.ui_mode & MASK_UI_MODE_NIGHT {
            0 => {}
            0x10 => parts.push("notnight".into()),
            0x20 => parts.push("night".into()),
            v => parts.push(format!("uiModeNight={}", v)),
        }
        match self.density {
            DENSITY_DEFAULT => {}
            DENSITY_LOW => parts.push("ldpi".into()),
            DENSITY_MEDIUM => parts.push("mdpi".into()),
            DENSITY_TV => parts.push("tvdpi".into()),
            DENSITY_HIGH => parts.push("hdpi".into()),
            DENSITY_XHIGH => parts.push("xhdpi".into()),
            DENSITY_XXHIGH => parts.push("xxhdpi".into()),
            DENSITY_XXXHIGH => parts.push("xxxhdpi".into()),
            DENSITY_ANY => parts.push("anydpi".into()),
            DENSITY_NONE => parts.push("nodpi".into()),
            v => parts.push(format!("{}dpi", v)),
        }
        match self.touchscreen {
            0 => {}
            0x01 => parts.push("notouch".into()),
            0x02 => parts.push("stylus".into()),
            0x03 => parts.push("finger".into()),
            v => parts.push(format!("touchscreen={}", v)),
        }
        match self.input_flags & MASK_KEYSHIDDEN {
            0 => {}
            0x01 => parts.push("keysexposed".into()),
            0x02 => parts.push("keyshidden".into()),
            _ => parts.push("keyssoft".into()),
        }
        match self.keyboard {
            0 => {}
            0x01 => parts.push("nokeys".into()),
            0x02 => parts.push("qwerty".into()),
            0x03 => parts.push("12key".into()),
            v => parts.push(format!("keyboard={}", v)),
        }
        match self.input_flags & MASK_NAVHIDDEN {
            0 => {}
            0x04 => parts.push("navexposed".into()),
            0x08 => parts.push("navhidden".into()),
            v => parts.push(format!("inputFlagsNavHidden={}", v)),
        }
        match self.navigation {
            0 => {}
            0x01 => parts.push("nonav".into()),
            0x02 => parts.push("dpad".into()),
            0x03 => parts.push("trackball".into()),
            0x04 => parts.push("wheel".into()),
            v => parts.push(format!("navigation={}", v)),
        }
        if self.screen_width != 0 || self.screen_height != 0 {
            parts.push(format!("{}x{}", self.screen_width, self.screen_height));
        }
        if self.sdk_version != 0 || self.minor_version != 0 {
            let mut version = format!("v{}", self.sdk_version);
            if self.minor_version != 0 {
                version.push_str(&format!(".{}", self.minor_version));
            }
            parts.push(version);
        }

        parts.join("-")
    }

    fn locale_qualifier(&self) -> Option<String> {
        let language = self.language()?;
        let region = self.region();
        let script = trimmed_ascii(&self.locale_script);
        let variant = trimmed_ascii(&self.locale_variant);
        let numbering = trimmed_ascii(&self.locale_numbering_system);
        let script = script.filter(|_| !self.locale_script_was_computed);

        if script.is_none() && variant.is_none() && numbering.is_none() {
            return Some(match region {
                Some(region) => format!("{}-r{}", language, region),
                None => language,
            });
        }

        let mut tag = format!("b+{}", language);
        for part in [script, region, variant].into_iter().flatten() {
            tag.push('+');
            tag.push_str(&part);
        }
        if let Some(numbering) = numbering {
            tag.push_str("+u+nu+");
            tag.push_str(&numbering);
        }
        Some(tag)
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let qualifiers = self.qualifiers();
        if qualifiers.is_empty() {
            write!(f, "default")
        } else {
            write!(f, "{}", qualifiers)
        }
    }
}

/// Two ASCII letters, or a packed three-letter code when the high bit of the
/// first byte is set: `1ttttt ss sss fffff` across the two bytes.
fn unpack_language_or_region(packed: [u8; 2], base: u8) -> Option<String> {
    if packed[0] == 0 {
        return None;
    }
    if packed[0] & 0x80 != 0 {
        let first = packed[1] & 0x1F;
        let second = ((packed[1] & 0xE0) >> 5) | ((packed[0] & 0x03) << 3);
        let third = (packed[0] & 0x7C) >> 2;
        let letters = [base + first, base + second, base + third];
        return Some(String::from_utf8_lossy(&letters).into_owned());
    }
    Some(String::from_utf8_lossy(&packed).into_owned())
}

fn trimmed_ascii(bytes: &[u8]) -> Option<String> {
    let len = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    if len == 0 {
        None
    } else {
        Some(String::from_utf8_lossy(&bytes[..len]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::error::ResErrorKind;
    use crate::tests::builder::config_bytes;

    fn decode(bytes: &[u8]) -> ResResult<Configuration> {
        Configuration::parse(&mut ChunkReader::new(bytes))
    }

    #[test]
    fn default_config_has_no_qualifiers() {
        let config = decode(&config_bytes(&Configuration::default())).unwrap();
        assert!(config.is_default());
        assert_eq!(config.qualifiers(), "");
        assert_eq!(config.to_string(), "default");
    }

    #[test]
    fn formats_in_platform_order() {
        let config = Configuration {
            language: *b"en",
            country: *b"GB",
            density: DENSITY_HIGH,
            sdk_version: 21,
            ..Configuration::default()
        };
        let decoded = decode(&config_bytes(&config)).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(decoded.qualifiers(), "en-rGB-hdpi-v21");

        let config = Configuration {
            mcc: 310,
            mnc: 4,
            screen_layout: 0x40 | 0x03 | 0x20,
            smallest_screen_width_dp: 600,
            screen_width_dp: 720,
            orientation: ORIENTATION_LAND,
            ui_mode: 0x04 | 0x20,
            density: DENSITY_ANY,
            touchscreen: 0x03,
            input_flags: 0x02 | 0x08,
            keyboard: 0x02,
            navigation: 0x02,
            sdk_version: 34,
            minor_version: 1,
            ..Configuration::default()
        };
        assert_eq!(
            decode(&config_bytes(&config)).unwrap().qualifiers(),
            "mcc310-mnc4-ldltr-sw600dp-w720dp-large-long-land-television-night-anydpi-finger-keyshidden-qwerty-navhidden-dpad-v34.1"
        );
    }

    #[test]
    fn decoding_is_deterministic() {
        let config = Configuration {
            language: *b"fr",
            density: 400,
            ..Configuration::default()
        };
        let bytes = config_bytes(&config);
        let a = decode(&bytes).unwrap();
        let b = decode(&bytes).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.qualifiers(), b.qualifiers());
        assert_eq!(a.qualifiers(), "fr-400dpi");
    }

    #[test]
    fn unpacks_three_letter_codes() {
        // "fil" packed: f=5, i=8, l=11
        let packed = [0x80 | (11 << 2) | (8 >> 3), ((8 & 0x07) << 5) | 5];
        let config = Configuration {
            language: packed,
            country: *b"PH",
            ..Configuration::default()
        };
        assert_eq!(config.language().as_deref(), Some("fil"));
        assert_eq!(config.qualifiers(), "fil-rPH");
    }

    #[test]
    fn script_switches_to_bcp47_form() {
        let config = Configuration {
            language: *b"sr",
            country: *b"RS",
            locale_script: *b"Latn",
            ..Configuration::default()
        };
        assert_eq!(config.qualifiers(), "b+sr+Latn+RS");

        let computed = Configuration {
            locale_script_was_computed: true,
            ..config
        };
        assert_eq!(computed.qualifiers(), "sr-rRS");
    }

    #[test]
    fn short_blob_leaves_newer_fields_at_any() {
        let full = Configuration {
            language: *b"de",
            sdk_version: 19,
            screen_width_dp: 320,
            ..Configuration::default()
        };
        let mut bytes = config_bytes(&full);
        // 28 bytes: the layout of early platform releases, up to the version
        bytes.truncate(28);
        bytes[..4].copy_from_slice(&28u32.to_le_bytes());
        let config = decode(&bytes).unwrap();
        assert_eq!(config.language().as_deref(), Some("de"));
        assert_eq!(config.sdk_version, 19);
        assert_eq!(config.screen_width_dp, 0);
        assert_eq!(config.qualifiers(), "de-v19");
    }

    #[test]
    fn keeps_trailing_bytes_of_newer_layouts() {
        let mut bytes = config_bytes(&Configuration::default());
        bytes.extend_from_slice(&[7, 0, 0, 0]);
        bytes[..4].copy_from_slice(&68u32.to_le_bytes());
        let mut reader = ChunkReader::new(&bytes);
        let config = Configuration::parse(&mut reader).unwrap();
        assert_eq!(config.unknown, vec![7, 0, 0, 0]);
        assert!(!config.is_default());
        assert_eq!(reader.position(), 68);
    }

    #[test]
    fn truncated_blob_fails() {
        let mut bytes = config_bytes(&Configuration::default());
        bytes.truncate(40);
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err.kind(), ResErrorKind::TruncatedChunk { .. }));
    }
}
