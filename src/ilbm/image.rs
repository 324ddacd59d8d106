//! Collect the chunks that describe one image into a flat descriptor,
//! and convert between compressed and uncompressed pixel bodies.

use crate::chunk::{AnyChunkData, Chunk, RawChunk};
use crate::compression::{ByteVec, Compression};
use crate::error::{Error, Result, UnitResult};
use crate::group::{Group, GroupKind};
use crate::id::Id;
use crate::registry::Registry;
use super::*;


/// References to the chunks of one image inside a parsed tree.
/// Does not own any chunk, so the tree must outlive the image.
/// Properties that are missing in the form are looked up
/// in the `PROP` groups of the enclosing lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<'t> {

    /// `ILBM`, `PBM ` or `ACBM`.
    pub form_type: Id,

    /// The bitmap header. Required for a valid image.
    pub header: Option<&'t BitMapHeader>,

    pub color_map: Option<&'t ColorMap>,
    pub cmyk_map: Option<&'t CmykMap>,
    pub color_names: Option<&'t ColorNames>,
    pub dpi: Option<&'t DpiHeader>,
    pub grab: Option<&'t Point2D>,
    pub dest_merge: Option<&'t DestMerge>,
    pub sprite: Option<&'t Sprite>,
    pub viewport: Option<&'t Viewport>,

    /// All `CRNG` chunks, in file order.
    pub color_ranges: Vec<&'t ColorRange>,

    /// All `DRNG` chunks, in file order.
    pub dranges: Vec<&'t DRange>,

    /// All `CCRT` chunks, in file order.
    pub cycle_infos: Vec<&'t CycleInfo>,

    /// The interleaved or packed pixels.
    pub body: Option<&'t RawChunk>,

    /// The contiguous planes of an `ACBM`.
    pub bitplanes: Option<&'t RawChunk>,
}

impl<'t> Image<'t> {

    /// An image without any chunks.
    pub fn new(form_type: Id) -> Self {
        Image {
            form_type,
            header: None, color_map: None, cmyk_map: None, color_names: None,
            dpi: None, grab: None, dest_merge: None, sprite: None, viewport: None,
            color_ranges: Vec::new(), dranges: Vec::new(), cycle_infos: Vec::new(),
            body: None, bitplanes: None,
        }
    }

    /// Collect the chunks of an image form.
    /// `lists` are the enclosing lists, outermost first.
    /// Returns `None` if the form is not an image form.
    pub fn from_form(form: &'t Group, lists: &[&'t Group]) -> Option<Self> {
        let form_type = form.form_type().filter(|form_type| IMAGE_FORM_TYPES.contains(form_type))?;

        let property = |id| -> Option<&'t Chunk> {
            form.chunk(id).or_else(|| {
                lists.iter().rev().find_map(|list| list.props().find_map(|prop| prop.chunk(id)))
            })
        };

        Some(Image {
            form_type,
            header: property(BMHD).and_then(Chunk::data),
            color_map: property(CMAP).and_then(Chunk::data),
            cmyk_map: property(CMYK).and_then(Chunk::data),
            color_names: property(CNAM).and_then(Chunk::data),
            dpi: property(DPI).and_then(Chunk::data),
            grab: property(GRAB).and_then(Chunk::data),
            dest_merge: property(DEST).and_then(Chunk::data),
            sprite: property(SPRT).and_then(Chunk::data),
            viewport: property(CAMG).and_then(Chunk::data),
            color_ranges: form.all_data(CRNG).collect(),
            dranges: form.all_data(DRNG).collect(),
            cycle_infos: form.all_data(CCRT).collect(),
            body: form.data(BODY),
            bitplanes: form.data(ABIT),
        })
    }

    /// The bitmap header, or an error if the image has none.
    pub fn header(&self) -> Result<&'t BitMapHeader> {
        self.header.ok_or_else(|| Error::invalid("image has no bitmap header"))
    }

    /// An image must have a bitmap header.
    pub fn check(&self) -> UnitResult {
        self.header().map(|_| ())
    }

    /// The number of bytes of a single row of a single plane.
    pub fn row_size(&self) -> Result<usize> {
        Ok(row_size(self.form_type, self.header()?))
    }

    /// The number of planes in the body, including the mask plane.
    pub fn plane_count(&self) -> Result<usize> {
        Ok(self.header()?.plane_count())
    }

    /// The number of colors the planes can address.
    pub fn color_count(&self) -> Result<u32> {
        let header = self.header()?;
        header.color_count().ok_or_else(|| Error::unsupported(format!("{} planes", header.planes)))
    }

    /// The uncompressed pixel rows, in the order of the file.
    /// For an `ILBM`, the rows of all planes alternate.
    pub fn decode_body(&self) -> Result<ByteVec> {
        let header = self.header()?;

        let pixels = match self.form_type {
            ACBM => self.bitplanes,
            _ => self.body,
        };

        let pixels = pixels.ok_or_else(|| Error::invalid("image has no pixel data"))?;
        let (row_bytes, row_count) = body_layout(self.form_type, header);
        body_compression(self.form_type, header)?.decompress_rows(&pixels.bytes, row_bytes, row_count)
    }

    /// An owned form containing copies of all chunks of this image, in canonical order.
    pub fn to_form(&self) -> Group {
        fn push<T: AnyChunkData + Clone>(form: &mut Group, id: Id, data: Option<&T>) {
            if let Some(data) = data {
                form.push(Chunk::new(id, data.clone()));
            }
        }

        let mut form = Group::form(self.form_type);

        push(&mut form, BMHD, self.header);
        push(&mut form, CMAP, self.color_map);
        push(&mut form, CMYK, self.cmyk_map);
        push(&mut form, CNAM, self.color_names);
        push(&mut form, DPI, self.dpi);
        push(&mut form, GRAB, self.grab);
        push(&mut form, DEST, self.dest_merge);
        push(&mut form, SPRT, self.sprite);
        push(&mut form, CAMG, self.viewport);

        for &range in &self.color_ranges { push(&mut form, CRNG, Some(range)); }
        for &range in &self.dranges { push(&mut form, DRNG, Some(range)); }
        for &info in &self.cycle_infos { push(&mut form, CCRT, Some(info)); }

        push(&mut form, BODY, self.body);
        push(&mut form, ABIT, self.bitplanes);
        form
    }
}


/// One descriptor per image form with a bitmap header, in file order.
/// Forms without a header are skipped, as they are delta frames of animations.
/// Fails if the tree contains no image form at all.
pub fn extract_images(root: &Chunk) -> Result<Vec<Image<'_>>> {
    if root.search_forms(&IMAGE_FORM_TYPES).is_empty() {
        return Err(Error::invalid("no form of type 'ILBM', 'PBM ' or 'ACBM' found"));
    }

    let mut images = Vec::new();
    collect_images(root, &mut Vec::new(), &mut images);
    Ok(images)
}

fn collect_images<'t>(chunk: &'t Chunk, lists: &mut Vec<&'t Group>, images: &mut Vec<Image<'t>>) {
    let group = match chunk.as_group() {
        Some(group) => group,
        None => return,
    };

    if let Some(image) = Image::from_form(group, lists) {
        if image.header.is_some() { images.push(image); }
        else { tracing::debug!(form_type = %image.form_type, "skipping image form without bitmap header"); }
    }

    let is_list = group.kind() == GroupKind::List;
    if is_list { lists.push(group); }

    for child in group.children() {
        collect_images(child, lists, images);
    }

    if is_list { lists.pop(); }
}

/// Validate the whole tree, then check every image.
pub fn check_images(root: &Chunk, registry: &Registry, images: &[Image<'_>]) -> UnitResult {
    root.validate(registry)?;

    for image in images {
        image.check()?;
    }

    Ok(())
}


/// The number of bytes of a single row of a single plane.
/// Planar rows are padded to 16 bits, packed rows to an even byte count.
pub fn row_size(form_type: Id, header: &BitMapHeader) -> usize {
    let width = usize::from(header.width);

    match form_type {
        PBM => width + width % 2,
        _ => (width + 15) / 16 * 2,
    }
}

/// The size of a row and the number of rows of the pixel data.
fn body_layout(form_type: Id, header: &BitMapHeader) -> (usize, usize) {
    let height = usize::from(header.height);

    match form_type {
        PBM => (row_size(form_type, header), height),
        _ => (row_size(form_type, header), height * header.plane_count()),
    }
}

/// Contiguous planes are never compressed.
fn body_compression(form_type: Id, header: &BitMapHeader) -> Result<Compression> {
    match form_type {
        ACBM => Ok(Compression::None),
        _ => header.compression(),
    }
}

/// Compress uncompressed pixel rows and set the compression of the header accordingly.
pub fn pack_body(form_type: Id, header: &mut BitMapHeader, rows: &[u8], compression: Compression) -> Result<RawChunk> {
    let (row_bytes, row_count) = body_layout(form_type, header);

    if form_type == ACBM && compression != Compression::None {
        return Err(Error::unsupported("compressed ACBM bitplanes"));
    }

    if rows.len() != row_bytes * row_count {
        return Err(Error::invalid(format!(
            "{} bytes of pixels do not match {} rows of {} bytes",
            rows.len(), row_count, row_bytes
        )));
    }

    let bytes = compression.compress_rows(rows, row_bytes)?;
    header.compression = compression.to_byte();
    Ok(RawChunk::new(bytes))
}

/// Decompress a pixel body and mark the header as uncompressed.
pub fn unpack_body(form_type: Id, header: &mut BitMapHeader, body: &RawChunk) -> Result<RawChunk> {
    let (row_bytes, row_count) = body_layout(form_type, header);
    let bytes = body_compression(form_type, header)?.decompress_rows(&body.bytes, row_bytes, row_count)?;

    header.compression = Compression::None.to_byte();
    Ok(RawChunk::new(bytes))
}

/// Reorder uncompressed interleaved rows, where each row holds every plane in turn,
/// into contiguous planes, where each plane holds every row, as stored in an `ACBM` body.
pub fn interleaved_to_contiguous(header: &BitMapHeader, rows: &[u8]) -> Result<ByteVec> {
    reorder_planes(header, rows, true)
}

/// Reorder contiguous planes, as stored in an `ACBM` body,
/// into interleaved rows, as stored in an uncompressed `ILBM` body.
pub fn contiguous_to_interleaved(header: &BitMapHeader, planes: &[u8]) -> Result<ByteVec> {
    reorder_planes(header, planes, false)
}

fn reorder_planes(header: &BitMapHeader, source: &[u8], to_contiguous: bool) -> Result<ByteVec> {
    let row_bytes = row_size(ILBM, header);
    let plane_count = header.plane_count();
    let height = usize::from(header.height);

    if source.len() != row_bytes * plane_count * height {
        return Err(Error::invalid(format!(
            "{} bytes of pixels do not match {} planes of {} rows of {} bytes",
            source.len(), plane_count, height, row_bytes
        )));
    }

    let mut target = vec![0_u8; source.len()];

    for y in 0 .. height {
        for plane in 0 .. plane_count {
            let interleaved = (y * plane_count + plane) * row_bytes;
            let contiguous = (plane * height + y) * row_bytes;

            let (from, to) = if to_contiguous { (interleaved, contiguous) } else { (contiguous, interleaved) };
            target[to .. to + row_bytes].copy_from_slice(&source[from .. from + row_bytes]);
        }
    }

    Ok(target)
}


#[cfg(test)]
mod test {
    use super::*;

    fn image_form(width: u16, height: u16, planes: u8, pixels: &[u8]) -> Group {
        let mut header = BitMapHeader::new(width, height, planes);
        let body = pack_body(ILBM, &mut header, pixels, Compression::ByteRun).unwrap();
        let palette = grayscale_color_map(&header).unwrap();

        Group::form(ILBM)
            .with_data(BMHD, header)
            .with_data(CMAP, palette)
            .with_data(CRNG, ColorRange { low: 0, high: 1, .. ColorRange::default() })
            .with_data(CRNG, ColorRange { low: 2, high: 3, .. ColorRange::default() })
            .with_data(BODY, body)
    }

    #[test]
    fn reorder_planes_of_two_rows(){
        let header = BitMapHeader::new(16, 2, 2);

        // row 0 plane 0, row 0 plane 1, row 1 plane 0, row 1 plane 1
        let interleaved = [ 1, 1, 2, 2, 3, 3, 4, 4 ];
        let contiguous = interleaved_to_contiguous(&header, &interleaved).unwrap();
        assert_eq!(contiguous, [ 1, 1, 3, 3, 2, 2, 4, 4 ]);

        assert_eq!(contiguous_to_interleaved(&header, &contiguous).unwrap(), interleaved);
        assert!(interleaved_to_contiguous(&header, &interleaved[.. 6]).is_err());
    }

    #[test]
    fn contiguous_planes_decode_like_acbm(){
        let mut header = BitMapHeader::new(20, 3, 3);
        let interleaved: Vec<u8> = (0 .. 4 * 3 * 3).map(|index| index as u8).collect();
        let contiguous = interleaved_to_contiguous(&header, &interleaved).unwrap();

        let bits = pack_body(ACBM, &mut header, &contiguous, Compression::None).unwrap();
        let form = Chunk::group(Group::form(ACBM).with_data(BMHD, header).with_data(ABIT, bits));

        let images = extract_images(&form).unwrap();
        let decoded = images[0].decode_body().unwrap();
        assert_eq!(decoded, contiguous);
        assert_eq!(contiguous_to_interleaved(images[0].header().unwrap(), &decoded).unwrap(), interleaved);
    }

    #[test]
    fn row_sizes(){
        let header = BitMapHeader::new(17, 1, 1);
        assert_eq!(row_size(ILBM, &header), 4);
        assert_eq!(row_size(ACBM, &header), 4);
        assert_eq!(row_size(PBM, &header), 18);

        let header = BitMapHeader::new(320, 1, 1);
        assert_eq!(row_size(ILBM, &header), 40);
        assert_eq!(row_size(PBM, &header), 320);
    }

    #[test]
    fn extracts_images_in_order(){
        let root = Chunk::group(Group::cat()
            .with_group(image_form(16, 2, 2, &[0; 8]))
            .with_group(Group::form(ILBM).with(Chunk::raw(Id(*b"DLTA"), vec![1, 2])))
            .with_group(image_form(32, 1, 1, &[0xFF; 4])));

        let images = extract_images(&root).unwrap();
        assert_eq!(images.len(), 2);

        assert_eq!(images[0].header.unwrap().width, 16);
        assert_eq!(images[0].color_ranges.len(), 2);
        assert_eq!(images[0].color_map.unwrap().registers.len(), 4);
        assert_eq!(images[1].row_size().unwrap(), 4);

        check_images(&root, registry(), &images).unwrap();
    }

    #[test]
    fn no_image_form_is_an_error(){
        let root = Chunk::group(Group::form(Id(*b"8SVX")));
        assert!(extract_images(&root).is_err());
    }

    #[test]
    fn properties_come_from_lists(){
        let root = Chunk::group(Group::list()
            .with_group(Group::prop()
                .with_data(BMHD, BitMapHeader::new(8, 1, 1))
                .with_data(CAMG, Viewport { mode: 0x800 }))
            .with_group(Group::form(ILBM).with(Chunk::raw(BODY, vec![0xF0, 0]))));

        let images = extract_images(&root).unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].viewport.unwrap().is_hold_and_modify());
        assert_eq!(images[0].decode_body().unwrap(), [0xF0, 0]);
    }

    #[test]
    fn decode_compressed_body(){
        let pixels: Vec<u8> = (0 .. 4 * 3 * 2).map(|index| (index / 5) as u8).collect();
        let root = Chunk::group(image_form(32, 3, 2, &pixels));

        let images = extract_images(&root).unwrap();
        assert_eq!(images[0].header.unwrap().compression, 1);
        assert_eq!(images[0].plane_count().unwrap(), 2);
        assert_eq!(images[0].color_count().unwrap(), 4);
        assert_eq!(images[0].decode_body().unwrap(), pixels);
    }

    #[test]
    fn short_body_fails(){
        let root = Chunk::group(Group::form(ILBM)
            .with_data(BMHD, BitMapHeader::new(16, 2, 1))
            .with(Chunk::raw(BODY, vec![0; 2])));

        let images = extract_images(&root).unwrap();
        assert!(images[0].decode_body().is_err());
    }

    #[test]
    fn to_form_uses_canonical_order(){
        let form = Group::form(ILBM)
            .with(Chunk::raw(BODY, vec![0, 0]))
            .with_data(CRNG, ColorRange::default())
            .with_data(CAMG, Viewport::default())
            .with_data(BMHD, BitMapHeader::new(16, 1, 1))
            .with(Chunk::raw(Id(*b"ANNO"), vec![1, 2]));

        let image = Image::from_form(&form, &[]).unwrap();
        let rebuilt = image.to_form();

        let ids: Vec<Id> = rebuilt.children().iter().map(Chunk::id).collect();
        assert_eq!(ids, [BMHD, CAMG, CRNG, BODY]);
        assert_eq!(Image::from_form(&rebuilt, &[]).unwrap(), image);
    }

    #[test]
    fn unpack_then_pack(){
        let mut header = BitMapHeader::new(16, 2, 1);
        let rows = [1, 1, 1, 1, 2, 3];
        assert!(pack_body(ILBM, &mut header, &rows, Compression::ByteRun).is_err());

        let rows = [1, 1, 2, 3];
        let packed = pack_body(ILBM, &mut header, &rows, Compression::ByteRun).unwrap();
        assert_eq!(header.compression, 1);

        let unpacked = unpack_body(ILBM, &mut header, &packed).unwrap();
        assert_eq!(header.compression, 0);
        assert_eq!(unpacked.bytes, rows);

        assert!(pack_body(ACBM, &mut header, &rows, Compression::ByteRun).is_err());
    }

    #[test]
    fn image_without_header_fails_check(){
        let image = Image::new(ILBM);
        assert!(image.check().is_err());
        assert!(image.row_size().is_err());
    }
}
