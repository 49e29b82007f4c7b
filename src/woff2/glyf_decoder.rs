use arrayvec::ArrayVec;
use bytes::{Buf, BufMut};

use crate::{
    Round4,
    error::{ConvertError, bail_if, bail_with_msg_if, u32_will_overflow, usize_will_overflow},
    variable_length::BufVariableExt as _,
};

// simple glyph flags
const GLYF_ON_CURVE: u8 = 1 << 0;
const GLYF_X_SHORT: u8 = 1 << 1;
const GLYF_Y_SHORT: u8 = 1 << 2;
const GLYF_REPEAT: u8 = 1 << 3;
const GLYF_THIS_X_IS_SAME: u8 = 1 << 4;
const GLYF_THIS_Y_IS_SAME: u8 = 1 << 5;
const OVERLAP_SIMPLE: u8 = 1 << 6;

const NUM_SUB_STREAMS: usize = 7;
const FLAG_OVERLAP_SIMPLE_BITMAP: u16 = 1 << 0;
// 98% of Google Fonts have no glyph above 5k bytes. Largest glyph ever observed was 72k bytes
const DEFAULT_GLYPH_BUF_SIZE: usize = 5120;

const FLAG_ARG_1_AND_2_ARE_WORDS: u16 = 1 << 0;
const FLAG_WE_HAVE_A_SCALE: u16 = 1 << 3;
const FLAG_MORE_COMPONENTS: u16 = 1 << 5;
const FLAG_WE_HAVE_AN_X_AND_Y_SCALE: u16 = 1 << 6;
const FLAG_WE_HAVE_A_TWO_BY_TWO: u16 = 1 << 7;
const FLAG_WE_HAVE_INSTRUCTIONS: u16 = 1 << 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Point {
    x: i32,
    y: i32,
    on_curve: bool,
}

#[derive(Debug)]
pub(crate) struct GlyfAndLocaData {
    /// The number of glyphs in the glyf table
    pub num_glyphs: u16,
    /// loca index format
    pub index_format: u16,
    /// The x_min of the bounding box of each glyph (0 for empty glyphs). Used to reconstruct
    /// the hmtx table
    pub x_mins: Vec<i16>,
    /// Encoded Open Type "glyf" table
    pub glyf_table: Vec<u8>,
    /// Encoded Open Type "loca" table
    pub loca_table: Vec<u8>,
}

/// Decode a WOFF2 transformed glyf table, producing both `glyf` and `loca`
///
/// <https://www.w3.org/TR/WOFF2/#glyf_table_format>
pub(crate) fn transform_glyf_table(data: &[u8]) -> Result<GlyfAndLocaData, ConvertError> {
    GlyfDecoder::new(data)?.transform()
}

struct GlyfDecoder<'a> {
    // State
    n_contour_stream: &'a [u8],
    n_points_stream: &'a [u8],
    flag_stream: &'a [u8],
    glyph_stream: &'a [u8],
    composite_stream: &'a [u8],
    bbox_bitmap: &'a [u8],
    bbox_stream: &'a [u8],
    instruction_stream: &'a [u8],
    overlap_bitmap: Option<&'a [u8]>,
    glyph_buf: Vec<u8>,

    // Output data
    num_glyphs: u16,
    index_format: u16,
}

fn bit_is_set(bitmap: &[u8], i: usize) -> bool {
    (bitmap[i >> 3] & (0x80 >> (i & 7))) != 0
}

impl<'a> GlyfDecoder<'a> {
    fn new(data: &'a [u8]) -> Result<GlyfDecoder<'a>, ConvertError> {
        let mut input = data;
        let _: u16 = input.try_get_u16()?; // first 2 bytes are reserved
        let flags: u16 = input.try_get_u16()?;
        let has_overlap_bitmap: bool = (flags & FLAG_OVERLAP_SIMPLE_BITMAP) != 0;
        let num_glyphs = input.try_get_u16()?;
        let index_format = input.try_get_u16()?;

        let mut offset: usize = (2 + NUM_SUB_STREAMS) * 4;
        bail_if!(
            offset > data.len(),
            ConvertError::Malformed("transformed glyf header is truncated")
        );

        // Invariant from here on: data.len() >= offset
        let mut substreams: ArrayVec<&[u8], NUM_SUB_STREAMS> = ArrayVec::new();
        for _ in 0..NUM_SUB_STREAMS {
            let substream_size: usize = input.try_get_u32()? as usize;
            bail_if!(
                substream_size > data.len() - offset,
                ConvertError::Malformed("glyf substream extends past the end of the table")
            );
            substreams.push(&data[offset..(offset + substream_size)]);
            offset += substream_size;
        }

        // Safe because num_glyphs is bounded
        let bitmap_length: usize = ((num_glyphs as usize + 31) >> 5) << 2;
        bail_if!(
            bitmap_length > substreams[5].len(),
            ConvertError::Malformed("bbox stream is shorter than its bitmap")
        );

        let (bbox_bitmap, bbox_stream) = substreams[5].split_at(bitmap_length);

        let mut overlap_bitmap: Option<&[u8]> = None;
        if has_overlap_bitmap {
            let overlap_bitmap_length = (num_glyphs as usize + 7) >> 3;
            bail_if!(
                overlap_bitmap_length > data.len() - offset,
                ConvertError::Malformed("overlap bitmap extends past the end of the table")
            );
            overlap_bitmap = Some(&data[offset..(offset + overlap_bitmap_length)]);
        }

        Ok(GlyfDecoder {
            n_contour_stream: substreams[0],
            n_points_stream: substreams[1],
            flag_stream: substreams[2],
            glyph_stream: substreams[3],
            composite_stream: substreams[4],
            bbox_bitmap,
            bbox_stream,
            instruction_stream: substreams[6],
            overlap_bitmap,
            // Scratch buffer to decode glyphs into.
            glyph_buf: Vec::with_capacity(DEFAULT_GLYPH_BUF_SIZE),
            num_glyphs,
            index_format,
        })
    }

    fn transform(mut self) -> Result<GlyfAndLocaData, ConvertError> {
        let mut glyf_table: Vec<u8> = Vec::with_capacity(self.num_glyphs as usize * 12);
        let mut loca_values: Vec<u32> = Vec::with_capacity(self.num_glyphs as usize + 1);
        let mut x_mins: Vec<i16> = Vec::with_capacity(self.num_glyphs as usize);

        for i in 0..(self.num_glyphs as usize) {
            loca_values.push(glyf_table.len() as u32);

            let n_contours: i16 = self.n_contour_stream.try_get_i16()?;
            let glyph_has_bbox = bit_is_set(self.bbox_bitmap, i);

            self.glyph_buf.clear();
            if n_contours == -1 {
                bail_with_msg_if!(
                    !glyph_has_bbox,
                    ConvertError::Malformed("composite glyph without an explicit bbox"),
                    "glyph {i} is composite but has no bbox"
                );
                self.parse_composite_glyph()?;
            } else if n_contours > 0 {
                // Note: this indexes into a different bitmap than glyph_has_bbox above
                let has_overlap_bit = self
                    .overlap_bitmap
                    .is_some_and(|bitmap| bit_is_set(bitmap, i));
                self.parse_simple_glyph(n_contours, glyph_has_bbox, has_overlap_bit)?;
            } else {
                // n_contours == 0; empty glyph. Must NOT have a bbox.
                bail_with_msg_if!(
                    glyph_has_bbox || n_contours < -1,
                    ConvertError::Malformed("invalid empty glyph"),
                    "glyph {i} has {n_contours} contours and bbox flag {glyph_has_bbox}"
                );
            }

            glyf_table.extend_from_slice(&self.glyph_buf);
            glyf_table.resize(Round4!(glyf_table.len()), 0);

            // The x_min value is an i16 stored as bytes 2-4 in the glyph header; hmtx
            // reconstruction needs one per glyph.
            let x_min = match self.glyph_buf.get(2..4) {
                Some(&[hi, lo]) => i16::from_be_bytes([hi, lo]),
                _ => 0,
            };
            x_mins.push(x_min);
        }

        // loca[n] will be equal the length of the glyph data ('glyf') table
        loca_values.push(glyf_table.len() as u32);

        let loca_table = generate_loca_table(&loca_values, self.index_format)?;

        Ok(GlyfAndLocaData {
            num_glyphs: self.num_glyphs,
            index_format: self.index_format,
            x_mins,
            glyf_table,
            loca_table,
        })
    }

    /// Parse glyph data into `self.glyph_buf`
    fn parse_composite_glyph(&mut self) -> Result<(), ConvertError> {
        // Size the glyph on a copy of the stream so the bytes counted here can be copied below.
        let mut ro_composite_stream = self.composite_stream;
        let (composite_size, have_instructions) =
            compute_size_of_composite(&mut ro_composite_stream)?;

        let instruction_size: u16 = if have_instructions {
            self.glyph_stream.try_get_variable_255_u16()?
        } else {
            0
        };

        let size_needed: usize = 12 + composite_size + (instruction_size as usize);
        self.glyph_buf.reserve(size_needed);

        let n_contours: i16 = -1; // All composite glyphs has n_contours = -1
        self.glyph_buf.put_i16(n_contours);

        self.bbox_stream.try_read_bytes_into(8, &mut self.glyph_buf)?;
        self.composite_stream
            .try_read_bytes_into(composite_size, &mut self.glyph_buf)?;

        if have_instructions {
            self.glyph_buf.put_u16(instruction_size);
            self.instruction_stream
                .try_read_bytes_into(instruction_size as usize, &mut self.glyph_buf)?;
        }

        Ok(())
    }

    fn parse_simple_glyph(
        &mut self,
        n_contours: i16,
        glyph_has_bbox: bool,
        has_overlap_bit: bool,
    ) -> Result<(), ConvertError> {
        let n_contours = n_contours as usize;

        let mut n_points_vec: Vec<u16> = Vec::with_capacity(n_contours);
        let mut total_n_points: u32 = 0;
        for _ in 0..n_contours {
            let n_points_contour: u16 = self.n_points_stream.try_get_variable_255_u16()?;
            n_points_vec.push(n_points_contour);
            bail_if!(
                u32_will_overflow(total_n_points, n_points_contour as u32),
                ConvertError::Malformed("too many points in glyph")
            );
            total_n_points += n_points_contour as u32;
        }
        let flag_size: usize = total_n_points as usize;
        bail_if!(
            flag_size > self.flag_stream.len(),
            ConvertError::OutOfBounds {
                requested: flag_size,
                available: self.flag_stream.len(),
            }
        );

        let mut points = Vec::with_capacity(flag_size);
        let triplet_bytes_consumed =
            decode_triplet(&self.flag_stream[..flag_size], self.glyph_stream, &mut points)?;

        self.flag_stream.advance(flag_size);
        self.glyph_stream.advance(triplet_bytes_consumed);

        let instruction_size: u16 = self.glyph_stream.try_get_variable_255_u16()?;
        bail_if!(
            total_n_points >= (1 << 27),
            ConvertError::Malformed("too many points in glyph")
        );

        // Reserve needed size to reduce allocations
        let size_needed: usize =
            12 + 2 * n_contours + 5 * flag_size + (instruction_size as usize);
        self.glyph_buf.reserve(size_needed);

        self.glyph_buf.put_i16(n_contours as i16);

        if glyph_has_bbox {
            self.bbox_stream.try_read_bytes_into(8, &mut self.glyph_buf)?;
        } else {
            write_bbox(&points, &mut self.glyph_buf);
        }

        let mut end_point: i32 = -1;
        for contour in n_points_vec {
            end_point += contour as i32;
            bail_if!(
                end_point >= 65536,
                ConvertError::Malformed("contour end point does not fit in 16 bits")
            );
            self.glyph_buf.put_u16(end_point as u16);
        }

        self.glyph_buf.put_u16(instruction_size);
        self.instruction_stream
            .try_read_bytes_into(instruction_size as usize, &mut self.glyph_buf)?;

        write_glyph_points(&points, has_overlap_bit, &mut self.glyph_buf);

        Ok(())
    }
}

fn point_flag(
    point: &Point,
    last_x: i32,
    last_y: i32,
    is_first: bool,
    has_overlap_bit: bool,
) -> u8 {
    let mut flag: u8 = 0;

    if point.on_curve {
        flag |= GLYF_ON_CURVE;
    }
    if has_overlap_bit && is_first {
        flag |= OVERLAP_SIMPLE;
    }

    let dx: i32 = point.x - last_x;
    if dx == 0 {
        flag |= GLYF_THIS_X_IS_SAME;
    } else if dx > -256 && dx < 256 {
        flag |= GLYF_X_SHORT | (if dx > 0 { GLYF_THIS_X_IS_SAME } else { 0 });
    }

    let dy: i32 = point.y - last_y;
    if dy == 0 {
        flag |= GLYF_THIS_Y_IS_SAME;
    } else if dy > -256 && dy < 256 {
        flag |= GLYF_Y_SHORT | (if dy > 0 { GLYF_THIS_Y_IS_SAME } else { 0 });
    }

    flag
}

fn put_flag(dst: &mut impl BufMut, flag: u8, repeat_count: u8) {
    if repeat_count > 0 {
        dst.put_u8(flag | GLYF_REPEAT);
        dst.put_u8(repeat_count);
    } else {
        dst.put_u8(flag);
    }
}

/// Append the flags and coordinates of a simple glyph
fn write_glyph_points(points: &[Point], has_overlap_bit: bool, dst: &mut impl BufMut) {
    // Flags are written lazily: a flag is only emitted once we know it will not repeat.
    // GLYF_REPEAT is only set at that point, otherwise the equality check below would
    // never match.
    let mut last_flag: Option<u8> = None;
    let mut repeat_count: u8 = 0;
    let mut last_x: i32 = 0;
    let mut last_y: i32 = 0;
    for (i, point) in points.iter().enumerate() {
        let flag = point_flag(point, last_x, last_y, i == 0, has_overlap_bit);

        match last_flag {
            Some(last) if last == flag && repeat_count < 255 => repeat_count += 1,
            Some(last) => {
                put_flag(dst, last, repeat_count);
                repeat_count = 0;
            }
            None => {}
        }

        last_x = point.x;
        last_y = point.y;
        last_flag = Some(flag);
    }
    if let Some(last) = last_flag {
        put_flag(dst, last, repeat_count);
    }

    // x coordinates
    last_x = 0;
    for point in points {
        let dx: i32 = point.x - last_x;
        if dx == 0 {
            // implied by the flag
        } else if dx > -256 && dx < 256 {
            dst.put_u8(dx.unsigned_abs() as u8);
        } else {
            // will always fit for valid input, but overflow is harmless
            dst.put_i16(dx as i16)
        }
        last_x += dx;
    }

    // y coordinates
    last_y = 0;
    for point in points {
        let dy: i32 = point.y - last_y;
        if dy == 0 {
            // implied by the flag
        } else if dy > -256 && dy < 256 {
            dst.put_u8(dy.unsigned_abs() as u8);
        } else {
            dst.put_i16(dy as i16)
        }
        last_y += dy;
    }
}

/// Compute the bounding box of the coordinates and append it to a glyf record
fn write_bbox(points: &[Point], dst: &mut impl BufMut) {
    let mut x_min: i32 = 0;
    let mut y_min: i32 = 0;
    let mut x_max: i32 = 0;
    let mut y_max: i32 = 0;

    if let Some(first) = points.first() {
        x_min = first.x;
        x_max = first.x;
        y_min = first.y;
        y_max = first.y;
    }
    for &Point { x, y, .. } in points.iter().skip(1) {
        x_min = x.min(x_min);
        x_max = x.max(x_max);
        y_min = y.min(y_min);
        y_max = y.max(y_max);
    }

    dst.put_i16(x_min as i16);
    dst.put_i16(y_min as i16);
    dst.put_i16(x_max as i16);
    dst.put_i16(y_max as i16);
}

fn compute_size_of_composite(
    composite_stream: &mut impl Buf,
) -> Result<(usize, bool), ConvertError> {
    let mut bytes_read: usize = 0;
    let mut we_have_instructions: bool = false;
    let mut flags: u16 = FLAG_MORE_COMPONENTS;
    while flags & FLAG_MORE_COMPONENTS != 0 {
        flags = composite_stream.try_get_u16()?;
        we_have_instructions |= (flags & FLAG_WE_HAVE_INSTRUCTIONS) != 0;
        let mut arg_size: usize = 2; // glyph index
        if flags & FLAG_ARG_1_AND_2_ARE_WORDS != 0 {
            arg_size += 4;
        } else {
            arg_size += 2;
        }
        if flags & FLAG_WE_HAVE_A_SCALE != 0 {
            arg_size += 2;
        } else if flags & FLAG_WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            arg_size += 4;
        } else if flags & FLAG_WE_HAVE_A_TWO_BY_TWO != 0 {
            arg_size += 8;
        }
        composite_stream.try_skip(arg_size)?;

        // 2 bytes for the flags + arg_size
        bytes_read += 2 + arg_size
    }

    Ok((bytes_read, we_have_instructions))
}

/// Decode the triplet-encoded points of a simple glyph, returning the number of bytes consumed
fn decode_triplet(
    flags_in: &[u8],
    in_: &[u8],
    result: &mut Vec<Point>,
) -> Result<usize, ConvertError> {
    #[inline(always)]
    fn with_sign(flag: i32, baseval: i32) -> i32 {
        // Precondition: 0 <= baseval < 65536 (to avoid integer overflow)
        if (flag & 1) != 0 { baseval } else { -baseval }
    }

    #[inline(always)]
    fn safe_add(a: i32, b: i32) -> Result<i32, ConvertError> {
        a.checked_add(b)
            .ok_or(ConvertError::Malformed("glyph coordinate overflows"))
    }

    let mut x: i32 = 0;
    let mut y: i32 = 0;

    // every point takes at least one byte
    bail_if!(
        flags_in.len() > in_.len(),
        ConvertError::OutOfBounds {
            requested: flags_in.len(),
            available: in_.len(),
        }
    );

    let mut triplet_index: usize = 0;

    for &flag in flags_in {
        let on_curve: bool = (flag >> 7) == 0;
        let flag = (flag & 0x7f) as i32;

        let n_data_bytes: usize = if flag < 84 {
            1
        } else if flag < 120 {
            2
        } else if flag < 124 {
            3
        } else {
            4
        };

        bail_if!(
            usize_will_overflow(triplet_index, n_data_bytes)
                || (triplet_index + n_data_bytes) > in_.len(),
            ConvertError::OutOfBounds {
                requested: triplet_index.saturating_add(n_data_bytes),
                available: in_.len(),
            }
        );

        let dx: i32;
        let dy: i32;
        if flag < 10 {
            dx = 0;
            dy = with_sign(flag, ((flag & 14) << 7) + in_[triplet_index] as i32);
        } else if flag < 20 {
            dx = with_sign(flag, (((flag - 10) & 14) << 7) + in_[triplet_index] as i32);
            dy = 0;
        } else if flag < 84 {
            let b0: i32 = flag - 20;
            let b1: i32 = in_[triplet_index] as i32;
            dx = with_sign(flag, 1 + (b0 & 0x30) + (b1 >> 4));
            dy = with_sign(flag >> 1, 1 + ((b0 & 0x0c) << 2) + (b1 & 0x0f));
        } else if flag < 120 {
            let b0: i32 = flag - 84;
            dx = with_sign(flag, 1 + ((b0 / 12) << 8) + in_[triplet_index] as i32);
            dy = with_sign(
                flag >> 1,
                1 + (((b0 % 12) >> 2) << 8) + in_[triplet_index + 1] as i32,
            );
        } else if flag < 124 {
            let b2: i32 = in_[triplet_index + 1] as i32;
            dx = with_sign(flag, ((in_[triplet_index] as i32) << 4) + (b2 >> 4));
            dy = with_sign(
                flag >> 1,
                ((b2 & 0x0f) << 8) + in_[triplet_index + 2] as i32,
            );
        } else {
            dx = with_sign(
                flag,
                ((in_[triplet_index] as i32) << 8) + in_[triplet_index + 1] as i32,
            );
            dy = with_sign(
                flag >> 1,
                ((in_[triplet_index + 2] as i32) << 8) + in_[triplet_index + 3] as i32,
            );
        }
        triplet_index += n_data_bytes;
        x = safe_add(x, dx)?;
        y = safe_add(y, dy)?;

        result.push(Point { x, y, on_curve });
    }

    Ok(triplet_index)
}

/// Generate a loca table given a slice of loca offsets and an index format
///
/// See <https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6loca.html>
pub(crate) fn generate_loca_table(
    loca_values: &[u32],
    index_format: u16,
) -> Result<Vec<u8>, ConvertError> {
    let offset_size: usize = if index_format != 0 { 4 } else { 2 };

    let mut loca_content: Vec<u8> = Vec::with_capacity(loca_values.len() * offset_size);
    if index_format != 0 {
        for &value in loca_values {
            // loca long version. The actual local offset is stored.
            loca_content.put_u32(value);
        }
    } else {
        for &value in loca_values {
            // loca short version. The actual local offset divided by 2 is stored.
            bail_if!(
                value >> 1 > u16::MAX as u32,
                ConvertError::Malformed("glyf table is too large for a short loca")
            );
            loca_content.put_u16((value >> 1) as u16);
        }
    }

    Ok(loca_content)
}
