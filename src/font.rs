use crate::error::PlateFillError;
use crate::types::Pt;
use crate::winansi;

/// Helvetica advance widths in 1/1000 em for WinAnsi codes 32..=255,
/// from the standard AFM tables. Unassigned codes are zero.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 224] = [
    //  sp     !     "     #     $     %     &     '
       278,  278,  355,  556,  556,  889,  667,  191,
    //   (     )     *     +     ,     -     .     /
       333,  333,  389,  584,  278,  333,  278,  278,
    //   0     1     2     3     4     5     6     7
       556,  556,  556,  556,  556,  556,  556,  556,
    //   8     9     :     ;     <     =     >     ?
       556,  556,  278,  278,  584,  584,  584,  556,
    //   @     A     B     C     D     E     F     G
      1015,  667,  667,  722,  722,  667,  611,  778,
    //   H     I     J     K     L     M     N     O
       722,  278,  500,  667,  556,  833,  722,  778,
    //   P     Q     R     S     T     U     V     W
       667,  778,  722,  667,  611,  722,  667,  944,
    //   X     Y     Z     [     \     ]     ^     _
       667,  667,  611,  278,  278,  278,  469,  556,
    //   `     a     b     c     d     e     f     g
       333,  556,  556,  500,  556,  556,  278,  556,
    //   h     i     j     k     l     m     n     o
       556,  222,  222,  500,  222,  833,  556,  556,
    //   p     q     r     s     t     u     v     w
       556,  556,  333,  500,  278,  556,  500,  722,
    //   x     y     z     {     |     }     ~   0x7F
       500,  500,  500,  334,  260,  334,  584,    0,
    // 0x80 euro  ..              ellipsis
       556,    0,  222,  556,  333, 1000,  556,  556,
       333, 1000,  667,  333, 1000,    0,  611,    0,
    // 0x90        quotes               bullet dashes
         0,  222,  222,  333,  333,  350,  556, 1000,
       333, 1000,  500,  333,  944,    0,  500,  667,
    // 0xA0 nbsp
       278,  333,  556,  556,  556,  556,  260,  556,
       333,  737,  370,  556,  584,  333,  737,  333,
       400,  584,  333,  333,  333,  556,  537,  278,
       333,  333,  365,  556,  834,  834,  834,  611,
    // 0xC0 accented capitals
       667,  667,  667,  667,  667,  667, 1000,  722,
       667,  667,  667,  667,  278,  278,  278,  278,
       722,  722,  778,  778,  778,  778,  778,  584,
       778,  722,  722,  722,  722,  667,  667,  611,
    // 0xE0 accented lowercase
       556,  556,  556,  556,  556,  556,  889,  500,
       556,  556,  556,  556,  278,  278,  278,  278,
       556,  556,  556,  556,  556,  556,  556,  584,
       611,  556,  556,  556,  556,  500,  556,  500,
];

/// How the font reaches the output PDF: a base-14 name reference, or an
/// embedded TrueType program.
#[derive(Debug, Clone)]
pub enum FontProgram {
    Builtin(&'static str),
    TrueType(Vec<u8>),
}

/// Text Measurer: a per-glyph advance table over the WinAnsi range plus the
/// descriptor metrics needed to write the font into a PDF. Measurement is a
/// pure function of text content and size.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    pub(crate) program: FontProgram,
    pub(crate) name: String,
    widths: [u16; 224],
    /// Advance of the replacement glyph ('?') that unmapped chars draw as.
    fallback_width: u16,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) is_fixed_pitch: bool,
}

impl FontMetrics {
    /// The base-14 Helvetica the reference template was tuned against.
    pub fn helvetica() -> Self {
        Self {
            program: FontProgram::Builtin("Helvetica"),
            name: "Helvetica".to_string(),
            widths: HELVETICA_WIDTHS,
            fallback_width: HELVETICA_WIDTHS[(b'?' - 32) as usize],
            ascent: 718,
            descent: -207,
            cap_height: 718,
            italic_angle: 0,
            stem_v: 88,
            bbox: (-166, -225, 1000, 931),
            is_fixed_pitch: false,
        }
    }

    /// Derives the same advance table from a TrueType/OpenType face. The
    /// font program is embedded in the output so a re-tuned template can use
    /// its own face without touching the renderer.
    pub fn from_ttf_bytes(data: Vec<u8>, source_name: Option<&str>) -> Result<Self, PlateFillError> {
        let source = source_name.unwrap_or("EmbeddedFont");
        let Ok(face) = ttf_parser::Face::parse(&data, 0) else {
            return Err(PlateFillError::Asset(format!(
                "invalid font data for {source}"
            )));
        };

        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;
        let mut widths = [0u16; 224];
        for (idx, slot) in widths.iter_mut().enumerate() {
            let code = (idx + 32) as u8;
            let Some(ch) = winansi::char_for_byte(code) else {
                continue;
            };
            let advance = face
                .glyph_index(ch)
                .and_then(|gid| face.glyph_hor_advance(gid))
                .unwrap_or(0);
            let scaled = (advance as f32 * scale).round() as i32;
            *slot = scaled.clamp(0, u16::MAX as i32) as u16;
        }
        let fallback_width = widths[(b'?' - 32) as usize];

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let name = face_name(&face).unwrap_or_else(|| source.to_string());
        let is_fixed_pitch = face.is_monospaced();

        Ok(Self {
            program: FontProgram::TrueType(data),
            name,
            widths,
            fallback_width,
            ascent,
            descent,
            cap_height,
            italic_angle,
            stem_v: 80,
            bbox,
            is_fixed_pitch,
        })
    }

    /// Measured width of `text` at `font_size`. Empty text measures zero.
    /// Chars outside the WinAnsi range measure as the replacement '?' glyph,
    /// which is exactly what they draw as.
    pub fn text_width(&self, text: &str, font_size: Pt) -> Pt {
        let mut total_units: i32 = 0;
        for ch in text.chars() {
            total_units = total_units.saturating_add(self.advance(ch) as i32);
        }
        if total_units <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total_units, 1000)
    }

    pub(crate) fn advance(&self, ch: char) -> u16 {
        match winansi::byte_for_char(ch) {
            Some(code) => self.widths[(code - 32) as usize],
            None => self.fallback_width,
        }
    }

    pub(crate) fn widths(&self) -> &[u16; 224] {
        &self.widths
    }
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn face_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    let mut family = None;
    let mut full = None;
    let mut post = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::POST_SCRIPT_NAME => {
                if post.is_none() {
                    post = Some(name);
                }
            }
            name_id::FULL_NAME => {
                if full.is_none() {
                    full = Some(name);
                }
            }
            name_id::TYPOGRAPHIC_FAMILY | name_id::FAMILY => {
                if family.is_none() {
                    family = Some(name);
                }
            }
            _ => {}
        }
    }
    post.or(full).or(family)
}

/// A valid single-glyph TrueType face built in memory: head, hhea, maxp,
/// hmtx, and a cmap mapping 'A' to a 600-unit glyph at 1000 units/em. Table
/// checksums are left at zero since the parser does not verify them.
#[cfg(test)]
pub(crate) fn minimal_truetype_bytes() -> Vec<u8> {
    fn u16be(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_be_bytes());
    }
    fn i16be(out: &mut Vec<u8>, v: i16) {
        out.extend_from_slice(&v.to_be_bytes());
    }
    fn u32be(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    let mut cmap = Vec::new();
    u16be(&mut cmap, 0); // version
    u16be(&mut cmap, 1); // one encoding record
    u16be(&mut cmap, 3); // Windows
    u16be(&mut cmap, 1); // Unicode BMP
    u32be(&mut cmap, 12); // subtable offset
    u16be(&mut cmap, 4); // format 4
    u16be(&mut cmap, 32); // subtable length
    u16be(&mut cmap, 0); // language
    u16be(&mut cmap, 4); // segCountX2
    u16be(&mut cmap, 4); // searchRange
    u16be(&mut cmap, 1); // entrySelector
    u16be(&mut cmap, 0); // rangeShift
    u16be(&mut cmap, 0x0041); // endCode: 'A', then terminator
    u16be(&mut cmap, 0xFFFF);
    u16be(&mut cmap, 0); // reservedPad
    u16be(&mut cmap, 0x0041); // startCode
    u16be(&mut cmap, 0xFFFF);
    u16be(&mut cmap, 0xFFC0); // idDelta: 0x41 -> glyph 1
    u16be(&mut cmap, 1);
    u16be(&mut cmap, 0); // idRangeOffset
    u16be(&mut cmap, 0);

    let mut head = Vec::new();
    u32be(&mut head, 0x0001_0000); // version
    u32be(&mut head, 0); // fontRevision
    u32be(&mut head, 0); // checkSumAdjustment
    u32be(&mut head, 0x5F0F_3CF5); // magic
    u16be(&mut head, 0); // flags
    u16be(&mut head, 1000); // unitsPerEm
    head.extend_from_slice(&[0u8; 16]); // created, modified
    i16be(&mut head, 0); // xMin
    i16be(&mut head, -200); // yMin
    i16be(&mut head, 600); // xMax
    i16be(&mut head, 800); // yMax
    u16be(&mut head, 0); // macStyle
    u16be(&mut head, 8); // lowestRecPPEM
    i16be(&mut head, 2); // fontDirectionHint
    i16be(&mut head, 0); // indexToLocFormat
    i16be(&mut head, 0); // glyphDataFormat

    let mut hhea = Vec::new();
    u32be(&mut hhea, 0x0001_0000); // version
    i16be(&mut hhea, 800); // ascender
    i16be(&mut hhea, -200); // descender
    i16be(&mut hhea, 0); // lineGap
    u16be(&mut hhea, 600); // advanceWidthMax
    i16be(&mut hhea, 0); // minLeftSideBearing
    i16be(&mut hhea, 0); // minRightSideBearing
    i16be(&mut hhea, 600); // xMaxExtent
    i16be(&mut hhea, 1); // caretSlopeRise
    i16be(&mut hhea, 0); // caretSlopeRun
    i16be(&mut hhea, 0); // caretOffset
    hhea.extend_from_slice(&[0u8; 8]); // reserved
    i16be(&mut hhea, 0); // metricDataFormat
    u16be(&mut hhea, 2); // numberOfHMetrics

    let mut hmtx = Vec::new();
    u16be(&mut hmtx, 500); // glyph 0 advance
    i16be(&mut hmtx, 0);
    u16be(&mut hmtx, 600); // glyph 1 advance
    i16be(&mut hmtx, 0);

    let mut maxp = Vec::new();
    u32be(&mut maxp, 0x0000_5000); // version 0.5, no glyf required
    u16be(&mut maxp, 2); // numGlyphs

    let tables: [(&[u8; 4], &Vec<u8>); 5] = [
        (b"cmap", &cmap),
        (b"head", &head),
        (b"hhea", &hhea),
        (b"hmtx", &hmtx),
        (b"maxp", &maxp),
    ];
    let mut out = Vec::new();
    u32be(&mut out, 0x0001_0000); // sfnt version
    u16be(&mut out, tables.len() as u16);
    u16be(&mut out, 0); // searchRange
    u16be(&mut out, 0); // entrySelector
    u16be(&mut out, 0); // rangeShift
    let mut offset = 12 + 16 * tables.len() as u32;
    for (tag, data) in &tables {
        out.extend_from_slice(*tag);
        u32be(&mut out, 0); // checksum
        u32be(&mut out, offset);
        u32be(&mut out, data.len() as u32);
        offset += data.len() as u32;
    }
    for (_, data) in &tables {
        out.extend_from_slice(data);
    }
    out
}
