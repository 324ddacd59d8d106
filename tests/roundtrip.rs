//! Write hand-built trees, read them back, and compare.

extern crate iff;
use iff::prelude::*;
use iff::ilbm::*;

fn id(name: &str) -> Id {
    Id::new_or_panic(name)
}

fn anno(text: &[u8]) -> Chunk {
    Chunk::raw(id("ANNO"), text.to_vec())
}

fn size_field(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}


#[test]
fn odd_chunks_are_padded(){
    let form = Chunk::group(Group::form(id("TEST"))
        .with(anno(b"odd"))
        .with(anno(b"even")));

    let bytes = form.to_bytes().unwrap();

    // header, type, 8 + 3 + 1 pad, 8 + 4
    assert_eq!(bytes.len(), 8 + 4 + 12 + 12);
    assert_eq!(size_field(&bytes, 4), 28);
    assert_eq!(size_field(&bytes, 16), 3);
    assert_eq!(bytes[23], 0);
    assert_eq!(&bytes[24 .. 28], b"ANNO");

    let read = Chunk::read_from_buffered(bytes.as_slice(), &Registry::new()).unwrap();
    assert_eq!(read, form);
    assert_eq!(read.to_bytes().unwrap(), bytes);
}

#[test]
fn sizes_match_serialized_length(){
    let mut tree = Chunk::group(Group::cat()
        .with_group(Group::form(id("TEST")).with(anno(b"a")))
        .with_group(Group::list()
            .with_group(Group::prop().with(anno(b"shared")))
            .with_group(Group::form(id("TEST")).with(anno(b"abc")))));

    tree.update_size();

    let bytes = tree.to_bytes().unwrap();
    assert_eq!(bytes.len(), tree.total_byte_size());
    assert_eq!(size_field(&bytes, 4) as usize, bytes.len() - 8);
    assert_eq!(tree.declared_size() as usize, bytes.len() - 8);

    let read = Chunk::read_from_buffered(bytes.as_slice(), &Registry::new()).unwrap();
    assert_eq!(read.declared_size(), tree.declared_size());
    read.validate(&Registry::new()).unwrap();
}

#[test]
fn mutation_keeps_sizes_consistent(){
    let mut form = Chunk::group(Group::form(id("TEST")).with(anno(b"first")));
    form.update_size();
    assert_eq!(form.declared_size(), 4 + 8 + 6);

    form.push(anno(b"second")).unwrap();
    assert_eq!(form.declared_size(), 4 + 8 + 6 + 8 + 6);

    let removed = form.remove(0).unwrap().unwrap();
    assert_eq!(removed.id(), id("ANNO"));
    assert_eq!(form.declared_size(), 4 + 8 + 6);

    assert!(anno(b"leaf").push(anno(b"child")).is_err());
}

#[test]
fn unknown_chunks_survive_typed_reading(){
    let form = Chunk::group(Group::form(ILBM)
        .with_data(BMHD, BitMapHeader::new(16, 1, 1))
        .with(Chunk::raw(id("XTRA"), vec![ 9, 8, 7, 6, 5 ]))
        .with(Chunk::raw(BODY, vec![ 0xAA, 0x55 ])));

    let bytes = form.to_bytes().unwrap();

    let typed = Chunk::read_from_buffered(bytes.as_slice(), registry()).unwrap();
    let untyped = Chunk::read_from_buffered(bytes.as_slice(), &Registry::new()).unwrap();

    let group = typed.as_group().unwrap();
    assert!(group.data::<BitMapHeader>(BMHD).is_some());
    assert_eq!(group.data::<RawChunk>(id("XTRA")).unwrap().bytes, [ 9, 8, 7, 6, 5 ]);

    assert!(untyped.as_group().unwrap().data::<BitMapHeader>(BMHD).is_none());
    assert_eq!(typed.to_bytes().unwrap(), bytes);
    assert_eq!(untyped.to_bytes().unwrap(), bytes);
}

#[test]
fn form_scoped_registrations(){
    let mut registry = Registry::new();
    registry.register_in(id("ONE "), BMHD, ChunkType::of::<BitMapHeader>());

    let tree = Chunk::group(Group::cat()
        .with_group(Group::form(id("ONE ")).with_data(BMHD, BitMapHeader::new(1, 1, 1)))
        .with_group(Group::form(id("TWO ")).with_data(BMHD, BitMapHeader::new(1, 1, 1))));

    let bytes = tree.to_bytes().unwrap();
    let read = Chunk::read_from_buffered(bytes.as_slice(), &registry).unwrap();
    let forms: Vec<&Group> = read.as_group().unwrap().forms().collect();

    assert!(forms[0].data::<BitMapHeader>(BMHD).is_some());
    assert!(forms[1].data::<BitMapHeader>(BMHD).is_none());
    assert!(forms[1].data::<RawChunk>(BMHD).is_some());
}

#[test]
fn concatenated_files(){
    let first = Chunk::group(Group::form(id("TEST")).with(anno(b"1")));
    let second = Chunk::group(Group::form(id("TEST")).with(anno(b"22")));

    let mut bytes = first.to_bytes().unwrap();
    bytes.extend(second.to_bytes().unwrap());

    let chunks = Chunk::read_all_from_buffered(bytes.as_slice(), &Registry::new()).unwrap();
    assert_eq!(chunks, vec![ first.clone(), second ]);

    // a single read ignores the rest
    let single = Chunk::read_from_buffered(bytes.as_slice(), &Registry::new()).unwrap();
    assert_eq!(single, first);
}

#[test]
fn bitmap_image_roundtrip(){
    let pixels: Vec<u8> = (0 .. 4 * 2 * 3).map(|index| if index % 5 == 0 { 0xFF } else { 0 }).collect();

    let mut header = BitMapHeader::new(32, 3, 2);
    let body = pack_body(ILBM, &mut header, &pixels, Compression::ByteRun).unwrap();
    let palette = grayscale_color_map(&header).unwrap();

    let mut range = ColorRange { low: 1, high: 3, rate: 4096, .. ColorRange::default() };
    range.set_active(true);

    let form = Chunk::group(Group::form(ILBM)
        .with_data(BMHD, header)
        .with_data(CMAP, palette)
        .with_data(CNAM, ColorNames::new(0, vec![ Text::from("black"), Text::from("white") ]))
        .with_data(CAMG, Viewport { mode: 0x8000 })
        .with_data(CRNG, range)
        .with_data(CCRT, CycleInfo { direction: 1, start: 0, end: 3, seconds: 1, microseconds: 500, pad: 0 })
        .with_data(BODY, body));

    form.validate(registry()).unwrap();

    let bytes = form.to_bytes().unwrap();
    let read = Chunk::read_from_buffered(bytes.as_slice(), registry()).unwrap();
    assert_eq!(read, form);

    let images = extract_images(&read).unwrap();
    assert_eq!(images.len(), 1);
    check_images(&read, registry(), &images).unwrap();

    let image = &images[0];
    assert_eq!(image.color_count().unwrap(), 4);
    assert_eq!(image.color_map.unwrap().registers.len(), 4);
    assert!(image.viewport.unwrap().is_hires());
    assert!(image.color_ranges[0].is_active());
    assert_eq!(image.decode_body().unwrap(), pixels);

    let rebuilt = Chunk::group(image.to_form());
    assert_eq!(rebuilt.to_bytes().unwrap(), bytes);
}

#[test]
fn printed_tree(){
    let form = Chunk::group(Group::form(ILBM)
        .with_data(GRAB, Point2D { x: 1, y: 2 }));

    let expected = "\
'FORM' = {
  chunkSize = 16;
  formType = 'ILBM';
  chunks = {
    'GRAB' = {
      chunkSize = 4;
      x = 1;
      y = 2;
    };
  };
};
";

    assert_eq!(form.to_string(), expected);
}
