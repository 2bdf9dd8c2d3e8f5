//! Text measurement capabilities used to size node boxes.
//!
//! The layout engine only ever asks for the advance width of a label. Hosts
//! with a real text stack plug in their own [`TextMeasure`]; the crate ships a
//! system-font measurer and a table-driven fallback that needs no fonts.

use crate::config::FontDescription;
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::Face;

static FONT_CACHE: Lazy<Mutex<FontCache>> = Lazy::new(|| Mutex::new(FontCache::new()));

/// Maps a label and a font to its advance width in pixels.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font: &FontDescription) -> f32;
}

impl<F> TextMeasure for F
where
    F: Fn(&str, &FontDescription) -> f32,
{
    fn text_width(&self, text: &str, font: &FontDescription) -> f32 {
        self(text, font)
    }
}

/// Measures with glyph advances from installed system fonts, falling back to
/// [`FallbackMeasurer`] when no face matches the requested family.
#[derive(Debug, Clone, Copy, Default)]
pub struct FontMeasurer;

impl TextMeasure for FontMeasurer {
    fn text_width(&self, text: &str, font: &FontDescription) -> f32 {
        measure_text_width(text, font).unwrap_or_else(|| FallbackMeasurer.text_width(text, font))
    }
}

/// Deterministic per-character width table; never touches the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackMeasurer;

impl TextMeasure for FallbackMeasurer {
    fn text_width(&self, text: &str, font: &FontDescription) -> f32 {
        fallback_text_width(text, font.size)
    }
}

pub fn measure_text_width(text: &str, font: &FontDescription) -> Option<f32> {
    if text.is_empty() || font.size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = FONT_CACHE.lock().ok()?;
    guard.measure(text, font)
}

pub fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars()
        .filter(|ch| *ch != '\n')
        .map(char_width_factor)
        .sum::<f32>()
        * font_size
}

pub(crate) fn char_width_factor(ch: char) -> f32 {
    // Advance widths relative to the font size, calibrated against a
    // sans-serif UI stack.
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        'A' => 0.652,
        'B' => 0.648,
        'C' => 0.734,
        'D' => 0.723,
        'E' => 0.594,
        'F' => 0.575,
        'G' | 'H' => 0.742,
        'I' => 0.272,
        'J' => 0.557,
        'K' => 0.648,
        'L' => 0.559,
        'M' => 0.903,
        'N' => 0.763,
        'O' => 0.754,
        'P' => 0.623,
        'Q' => 0.755,
        'R' => 0.637,
        'S' => 0.633,
        'T' => 0.599,
        'U' => 0.746,
        'V' => 0.661,
        'W' => 0.958,
        'X' => 0.655,
        'Y' => 0.646,
        'Z' => 0.621,
        'a' => 0.550,
        'b' => 0.603,
        'c' => 0.547,
        'd' => 0.609,
        'e' => 0.570,
        'f' => 0.340,
        'g' | 'h' => 0.600,
        'i' => 0.235,
        'j' => 0.227,
        'k' => 0.522,
        'l' => 0.239,
        'm' => 0.867,
        'n' => 0.585,
        'o' => 0.574,
        'p' => 0.595,
        'q' => 0.585,
        'r' => 0.364,
        's' => 0.523,
        't' => 0.305,
        'u' => 0.585,
        'v' => 0.545,
        'w' => 0.811,
        'x' => 0.538,
        'y' => 0.556,
        'z' => 0.550,
        '0' => 0.613,
        '1' => 0.396,
        '2' => 0.609,
        '3' => 0.597,
        '4' => 0.614,
        '5' => 0.586,
        '6' => 0.608,
        '7' => 0.559,
        '8' => 0.611,
        '9' => 0.595,
        '@' | '#' | '%' | '&' => 0.946,
        _ => 0.568,
    }
}

struct FontCache {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<(String, u16), Option<FontFace>>,
}

impl FontCache {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font: &FontDescription) -> Option<f32> {
        let key = (normalize_family_key(&font.family), font.weight);
        if !self.faces.contains_key(&key) {
            let face = self.load_face(&font.family, font.weight);
            self.faces.insert(key.clone(), face);
        }
        let face = self.faces.get_mut(&key).and_then(|face| face.as_mut())?;
        let normalized = text.replace('\t', "    ");
        face.measure_width(&normalized, font.size)
    }

    fn load_face(&mut self, font_family: &str, weight: u16) -> Option<FontFace> {
        #[derive(Clone, Copy)]
        enum FamilyToken {
            Generic(Family<'static>),
            Name(usize),
        }

        let mut names: Vec<String> = Vec::new();
        let mut order: Vec<FamilyToken> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            match raw.to_ascii_lowercase().as_str() {
                "serif" => order.push(FamilyToken::Generic(Family::Serif)),
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => {
                    order.push(FamilyToken::Generic(Family::SansSerif))
                }
                "monospace" | "ui-monospace" => order.push(FamilyToken::Generic(Family::Monospace)),
                "cursive" => order.push(FamilyToken::Generic(Family::Cursive)),
                "fantasy" => order.push(FamilyToken::Generic(Family::Fantasy)),
                _ => {
                    order.push(FamilyToken::Name(names.len()));
                    names.push(raw.to_string());
                }
            }
        }
        if order.is_empty() {
            order.push(FamilyToken::Generic(Family::SansSerif));
        }

        let families: Vec<Family<'_>> = order
            .iter()
            .map(|token| match *token {
                FamilyToken::Generic(family) => family,
                FamilyToken::Name(idx) => Family::Name(names[idx].as_str()),
            })
            .collect();

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight(weight),
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let id = self.db.query(&query)?;
        self.db
            .with_face_data(id, |data, index| FontFace::load(data.to_vec(), index))
            .flatten()
    }
}

struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascii_advances: [u16; 128],
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn load(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph_id) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph_id).unwrap_or(0);
            }
        }
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
            advance_cache: HashMap::new(),
        })
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;

        if text.is_ascii() {
            let width: f32 = text
                .bytes()
                .filter(|byte| *byte != b'\n')
                .map(|byte| match self.ascii_advances[byte as usize] {
                    0 => fallback,
                    advance => advance as f32 * scale,
                })
                .sum();
            return Some(width.max(0.0));
        }

        let missing: Vec<char> = text
            .chars()
            .filter(|ch| !self.advance_cache.contains_key(ch))
            .collect();
        if !missing.is_empty() {
            let face = Face::parse(&self.data, self.index).ok()?;
            for ch in missing {
                let advance = face
                    .glyph_index(ch)
                    .map(|glyph| face.glyph_hor_advance(glyph).unwrap_or(0));
                self.advance_cache.insert(ch, advance);
            }
        }

        let mut width = 0.0f32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            width += match self.advance_cache.get(&ch).copied().flatten() {
                Some(advance) => advance as f32 * scale,
                None => fallback,
            };
        }
        Some(width.max(0.0))
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}
