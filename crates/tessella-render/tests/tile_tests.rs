//! Integration tests for tile and meta-tile identifiers.

use tessella_render::{LookupError, MetaId, TileFormat, TileId, parse_path};

fn png(zoom: u8, x: u32, y: u32) -> TileId {
    TileId::new(zoom, x, y, TileFormat::Png)
}

#[test]
fn test_parse_path() {
    let (style, tile) = parse_path("/osm-bright/12/2200/1343.png").unwrap();
    assert_eq!(style, "osm-bright");
    assert_eq!(tile, png(12, 2200, 1343));

    let (_, tile) = parse_path("/default/0/0/0.svg").unwrap();
    assert_eq!(tile.format, TileFormat::Svg);
}

#[test]
fn test_parse_path_errors() {
    for path in [
        "default/1/0/0.png",
        "/1/0/0.png",
        "//1/0/0.png",
        "/default/1/0.png",
        "/default/1/0/0",
        "/default/a/0/0.png",
        "/default/1/0/0/0.png",
        "/default/1/-1/0.png",
    ] {
        assert!(
            matches!(parse_path(path), Err(LookupError::MalformedPath(_))),
            "{path}"
        );
    }
    assert_eq!(
        parse_path("/default/1/0/0.jpeg"),
        Err(LookupError::UnknownFormat("jpeg".to_string()))
    );
    assert_eq!(
        parse_path("/default/19/0/0.png"),
        Err(LookupError::ZoomOutOfRange(19))
    );
    assert_eq!(
        parse_path("/default/2/4/0.png"),
        Err(LookupError::OutOfRange { zoom: 2, x: 4, y: 0 })
    );
}

#[test]
fn test_validate() {
    assert!(png(0, 0, 0).validate().is_ok());
    assert!(png(18, 262_143, 262_143).validate().is_ok());
    assert_eq!(png(18, 262_144, 0).validate(), Err(LookupError::OutOfRange { zoom: 18, x: 262_144, y: 0 }));
    assert_eq!(png(30, 0, 0).validate(), Err(LookupError::ZoomOutOfRange(30)));
}

#[test]
fn test_meta_origin_and_members() {
    let meta = MetaId::for_tile(&png(10, 517, 334), 4);
    assert_eq!((meta.x, meta.y, meta.width, meta.height), (516, 332, 4, 4));
    assert!(meta.contains(&png(10, 517, 334)));
    assert!(meta.contains(&png(10, 519, 335)));
    assert!(!meta.contains(&png(10, 520, 334)));
    assert!(!meta.contains(&png(11, 517, 334)));
    assert!(!meta.contains(&TileId::new(10, 517, 334, TileFormat::Svg)));

    let members = meta.members();
    assert_eq!(members.len(), 16);
    assert_eq!(members[0], png(10, 516, 332));
    assert_eq!(members[1], png(10, 516, 333));
    assert_eq!(members[4], png(10, 517, 332));
    assert!(members.iter().all(|tile| meta.contains(tile)));
}

#[test]
fn test_meta_clipped_at_low_zoom() {
    let meta = MetaId::for_tile(&png(0, 0, 0), 4);
    assert_eq!((meta.width, meta.height), (1, 1));
    assert_eq!(meta.members(), vec![png(0, 0, 0)]);

    let meta = MetaId::for_tile(&png(2, 3, 1), 8);
    assert_eq!((meta.x, meta.y, meta.width, meta.height), (0, 0, 4, 4));
}

#[test]
fn test_meta_bounds_cover_members() {
    let meta = MetaId::for_tile(&png(5, 17, 9), 4);
    let bounds = meta.bounds();
    for tile in meta.members() {
        assert!(bounds.contains(&tile.bounds()), "{tile}");
    }
}

#[test]
fn test_sub_identifiers_cover_block() {
    let meta = MetaId::for_tile(&png(3, 4, 4), 4);
    let subs = meta.sub_identifiers(4);
    assert_eq!(subs.len(), 4);
    let covered: Vec<TileId> = subs.iter().flat_map(MetaId::members).collect();
    assert_eq!(covered.len(), 64);
    for x in 8..16 {
        for y in 8..16 {
            assert!(covered.contains(&png(4, x, y)), "{x}/{y}");
        }
    }

    // A clipped low-zoom block maps onto one block of the next level.
    let world = MetaId::for_tile(&png(0, 0, 0), 4);
    let subs = world.sub_identifiers(4);
    assert_eq!(subs.len(), 1);
    assert_eq!((subs[0].zoom, subs[0].width, subs[0].height), (1, 2, 2));

    let deepest = MetaId::for_tile(&png(18, 0, 0), 4);
    assert!(deepest.sub_identifiers(4).is_empty());
}
