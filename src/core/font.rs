//! The one font the text layer is drawn with: the standard Helvetica face,
//! WinAnsi-encoded. Nothing is embedded, so widths come from the AFM table.

/// Glyph advance widths (1/1000 em) for WinAnsi codes 32..=126.
const HELVETICA_ASCII_WIDTHS: [u16; 95] = [
  278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
  556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
  1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
  667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
  333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
  556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const DEFAULT_WIDTH: u16 = 556;

pub const FONT_RESOURCE: &str = "F1";
pub const BASE_FONT: &str = "Helvetica";

/// Map a char to its WinAnsiEncoding byte, if it has one.
pub fn win_ansi_byte(ch: char) -> Option<u8> {
  let code = ch as u32;
  match code {
    0x20..=0x7E | 0xA0..=0xFF => Some(code as u8),
    _ => {
      let byte = match ch {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
      };
      Some(byte)
    }
  }
}

/// Encode for a WinAnsi simple font; unencodable chars become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
  text
    .chars()
    .filter(|c| !c.is_control())
    .map(|c| win_ansi_byte(c).unwrap_or(b'?'))
    .collect()
}

fn glyph_width(byte: u8) -> u16 {
  match byte {
    0x20..=0x7E => HELVETICA_ASCII_WIDTHS[(byte - 0x20) as usize],
    _ => DEFAULT_WIDTH,
  }
}

/// Width of `text` in user-space units at `font_size`.
pub fn text_width(text: &str, font_size: f32) -> f32 {
  let units: u32 = encode_win_ansi(text)
    .into_iter()
    .map(|b| glyph_width(b) as u32)
    .sum();
  units as f32 * font_size / 1000.0
}
