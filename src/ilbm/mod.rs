//! The interleaved bitmap dialect: indexed images with a palette,
//! color cycling, and optionally compressed pixel planes.
//!
//! Use `registry()` to read files with typed chunks,
//! and `extract_images` to collect the chunks of each image.

pub mod bitmap_header;
pub mod color_map;
pub mod color_names;
pub mod color_range;
pub mod properties;
pub mod image;

pub use bitmap_header::{BitMapHeader, Masking};
pub use color_map::{ColorMap, ColorRegister, CmykMap, CmykRegister, grayscale_color_map};
pub use color_names::{ColorNames, Text};
pub use color_range::{ColorRange, DRange, DColor, DIndex, CycleInfo};
pub use properties::{DpiHeader, Point2D, DestMerge, Sprite, Viewport};
pub use image::{Image, extract_images, check_images, pack_body, unpack_body, interleaved_to_contiguous, contiguous_to_interleaved};

use std::sync::OnceLock;

use crate::error::{Error, UnitResult};
use crate::group::{Group, Scope};
use crate::id::Id;
use crate::registry::{ChunkType, Registry};


/// Interleaved bitmap: the rows of all planes alternate.
pub const ILBM: Id = Id(*b"ILBM");

/// Packed bitmap: one byte per pixel.
pub const PBM: Id = Id(*b"PBM ");

/// Contiguous bitmap: all rows of one plane, then all rows of the next plane.
pub const ACBM: Id = Id(*b"ACBM");

/// All form types that contain an image.
pub const IMAGE_FORM_TYPES: [Id; 3] = [ ILBM, PBM, ACBM ];

pub const BMHD: Id = Id(*b"BMHD");
pub const CMAP: Id = Id(*b"CMAP");
pub const CMYK: Id = Id(*b"CMYK");
pub const CNAM: Id = Id(*b"CNAM");
pub const DPI: Id = Id(*b"DPI ");
pub const GRAB: Id = Id(*b"GRAB");
pub const DEST: Id = Id(*b"DEST");
pub const SPRT: Id = Id(*b"SPRT");
pub const CAMG: Id = Id(*b"CAMG");
pub const CRNG: Id = Id(*b"CRNG");
pub const DRNG: Id = Id(*b"DRNG");
pub const CCRT: Id = Id(*b"CCRT");

/// Interleaved or packed pixel rows, possibly compressed.
pub const BODY: Id = Id(*b"BODY");

/// Contiguous pixel planes of an `ACBM`, never compressed.
pub const ABIT: Id = Id(*b"ABIT");

/// Chunks that may appear at most once per image form.
const SINGLETON_IDS: [Id; 11] = [ BMHD, CMAP, CMYK, CNAM, DPI, GRAB, DEST, SPRT, CAMG, BODY, ABIT ];


/// The shared registry with all chunk types and rules of this dialect.
/// Built on first use, never modified afterwards.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(new_registry)
}

/// A new registry with all chunk types and rules of this dialect,
/// to be extended with further chunk types.
pub fn new_registry() -> Registry {
    let mut registry = Registry::new();
    register(&mut registry);
    registry
}

/// Add all chunk types and rules of this dialect to an existing registry.
pub fn register(registry: &mut Registry) {
    registry
        .register(BMHD, ChunkType::of::<BitMapHeader>())
        .register(CMAP, ChunkType::of::<ColorMap>())
        .register(CMYK, ChunkType::of::<CmykMap>())
        .register(CNAM, ChunkType::of::<ColorNames>())
        .register(DPI, ChunkType::of::<DpiHeader>())
        .register(GRAB, ChunkType::of::<Point2D>())
        .register(DEST, ChunkType::of::<DestMerge>())
        .register(SPRT, ChunkType::of::<Sprite>())
        .register(CAMG, ChunkType::of::<Viewport>())
        .register(CRNG, ChunkType::of::<ColorRange>())
        .register(DRNG, ChunkType::of::<DRange>())
        .register(CCRT, ChunkType::of::<CycleInfo>())
        .register(BODY, ChunkType::raw())
        .register(ABIT, ChunkType::raw());

    for &form_type in &IMAGE_FORM_TYPES {
        registry.register_check(form_type, check_form);
    }
}

/// The structural rules of an image form:
/// no duplicate properties, pixels only with a bitmap header,
/// and the pixel chunk that matches the form type.
pub fn check_form(form: &Group, scope: &Scope<'_>) -> UnitResult {
    for &id in &SINGLETON_IDS {
        let count = form.chunks(id).count();

        if count > 1 {
            return Err(Error::invalid(format!(
                "image form contains {} chunks of type {}, but at most one is allowed",
                count, id
            )));
        }
    }

    let has_pixels = form.chunk(BODY).is_some() || form.chunk(ABIT).is_some();
    if has_pixels && scope.property(BMHD).is_none() {
        return Err(Error::invalid("pixel data requires a bitmap header"));
    }

    match form.form_type() {
        Some(ACBM) if form.chunk(BODY).is_some() => Err(Error::invalid("an ACBM form stores its pixels in ABIT, not BODY")),
        Some(ILBM) | Some(PBM) if form.chunk(ABIT).is_some() => Err(Error::invalid("only an ACBM form may contain ABIT")),
        _ => Ok(()),
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::chunk::{Chunk, RawChunk};

    #[test]
    fn registry_is_shared(){
        assert!(std::ptr::eq(registry(), registry()));
        assert!(registry().contains(Some(ILBM), CRNG));
        assert!(registry().check(PBM).is_some());
        assert!(registry().check(Id(*b"8SVX")).is_none());
    }

    #[test]
    fn typed_chunks_are_read(){
        let form = Chunk::group(Group::form(ILBM)
            .with_data(BMHD, BitMapHeader::new(4, 2, 1))
            .with_data(CRNG, ColorRange { low: 1, high: 2, .. ColorRange::default() })
            .with(Chunk::raw(Id(*b"ANNO"), b"made by hand".to_vec())));

        let bytes = form.to_bytes().unwrap();
        let read = Chunk::read_from_buffered(bytes.as_slice(), registry()).unwrap();
        let group = read.as_group().unwrap();

        assert_eq!(group.data::<BitMapHeader>(BMHD).unwrap().width, 4);
        assert_eq!(group.data::<ColorRange>(CRNG).unwrap().high, 2);
        assert!(group.data::<RawChunk>(Id(*b"ANNO")).is_some());
        assert_eq!(read, form);
    }

    #[test]
    fn duplicate_properties_are_invalid(){
        let form = Chunk::group(Group::form(ILBM)
            .with_data(BMHD, BitMapHeader::new(4, 2, 1))
            .with_data(CMAP, ColorMap::default())
            .with_data(CMAP, ColorMap::default()));

        let error = form.validate(registry()).unwrap_err();
        assert!(matches!(error.cause(), Error::Invalid(_)));
    }

    #[test]
    fn body_requires_header(){
        let form = Chunk::group(Group::form(ILBM).with(Chunk::raw(BODY, vec![0; 2])));
        assert!(form.validate(registry()).is_err());

        let shared = Chunk::group(Group::list()
            .with_group(Group::prop().with_data(BMHD, BitMapHeader::new(16, 1, 1)))
            .with_group(Group::form(ILBM).with(Chunk::raw(BODY, vec![0; 2]))));

        shared.validate(registry()).unwrap();
    }

    #[test]
    fn pixel_chunk_matches_form_type(){
        let acbm = Chunk::group(Group::form(ACBM)
            .with_data(BMHD, BitMapHeader::new(16, 1, 1))
            .with(Chunk::raw(BODY, vec![0; 2])));

        assert!(acbm.validate(registry()).is_err());

        let ilbm = Chunk::group(Group::form(ILBM)
            .with_data(BMHD, BitMapHeader::new(16, 1, 1))
            .with(Chunk::raw(ABIT, vec![0; 2])));

        assert!(ilbm.validate(registry()).is_err());
    }

    #[test]
    fn leaf_errors_carry_the_path(){
        let form = Chunk::group(Group::form(ILBM)
            .with_data(CRNG, ColorRange { low: 9, high: 1, .. ColorRange::default() }));

        let error = form.validate(registry()).unwrap_err();
        assert_eq!(error.chunk_path(), &[crate::id::FORM, CRNG]);
    }
}
