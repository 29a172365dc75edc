//! Opening and reading in-memory MXF files end to end.

mod common;

use archive_mxf::metadata::{Locator, SourceClip};
use archive_mxf::ul::labels;
use archive_mxf::{
    AncManifestElement, DataDefinition, DefaultPackageResolver, FileId, HeaderMetadata,
    MemoryFileFactory, MxfError, MxfFileReader, NonSeekableStream, OpenResult,
    OperationalPattern, PackageResolver, Rational, ReaderConfig, ResolvedPackage, TrackDetails,
    Umid,
};
use common::{
    ExternalFixture, FileSourceClip, IndexFixture, MxfFixture, PhysicalFixture, TimecodeFixture,
    TrackFixture,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::io::{Cursor, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

fn reader_for(files: &[(&str, Vec<u8>)]) -> MxfFileReader {
    let factory = MemoryFileFactory::new();
    for (path, data) in files {
        factory.insert(path, data.clone());
    }
    MxfFileReader::with_factory(factory)
}

#[test]
fn test_open_op1a_frame_wrapped() {
    let fixture = MxfFixture::op1a(5);
    let mut reader = reader_for(&[("clip.mxf", fixture.build())]);

    assert_eq!(reader.open("clip.mxf"), OpenResult::Success);
    assert!(reader.is_complete());
    assert!(reader.is_seekable());
    assert_eq!(reader.operational_pattern(), Some(OperationalPattern::Op1a));
    assert_eq!(reader.edit_rate(), Rational::fps_25());
    assert_eq!(reader.duration(), 5);
    assert_eq!(reader.origin(), 0);
    assert_eq!(reader.read_limits(), (0, 5));
    assert_eq!(reader.material_package_uid(), Some(fixture.material_uid));
    assert_eq!(reader.material_package_name(), Some("fixture"));

    assert_eq!(reader.num_track_readers(), 2);
    {
        let picture = reader.track_reader(0).unwrap();
        assert_eq!(picture.info().data_def, DataDefinition::Picture);
        assert_eq!(picture.info().material_track_id, 1);
        let sound = reader.track_reader(1).unwrap();
        assert_eq!(sound.info().data_def, DataDefinition::Sound);
        assert_eq!(sound.info().file_package_uid, fixture.file_uid);
    }

    assert_eq!(reader.read(3), 3);
    assert!(!reader.read_error());
    assert_eq!(reader.position(), 3);

    let picture = reader.track_reader(0).unwrap();
    let positions: Vec<i64> = picture.frame_buffer().iter().map(|f| f.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
    let frame = picture.frame_buffer().back().unwrap();
    assert_eq!(frame.data.len(), 64);
    assert_eq!(frame.data[0], MxfFixture::essence_byte(2, 0));

    let sound = reader.track_reader(1).unwrap();
    let frame = sound.frame_buffer().front().unwrap();
    assert_eq!(frame.num_samples, 1920);
    assert_eq!(frame.data.len(), 3840);
    assert_eq!(frame.data[0], MxfFixture::essence_byte(0, 1));
}

#[test]
fn test_read_stops_at_end_of_essence() {
    let mut reader = reader_for(&[("clip.mxf", MxfFixture::op1a(4).build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::Success);

    assert_eq!(reader.read(10), 4);
    assert_eq!(reader.read(1), 0);
    assert!(!reader.read_error());
    assert_eq!(reader.track_reader(0).unwrap().frame_buffer().len(), 4);
}

#[test]
fn test_read_limits_and_seek() {
    let mut reader = reader_for(&[("clip.mxf", MxfFixture::op1a(5).build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::Success);

    reader.set_read_limits(1, 2, true);
    assert_eq!(reader.position(), 1);
    assert_eq!(reader.read(10), 2);

    let picture = reader.track_reader(0).unwrap();
    let data: Vec<u8> = picture.frame_buffer().iter().map(|f| f.data[0]).collect();
    assert_eq!(
        data,
        vec![MxfFixture::essence_byte(1, 0), MxfFixture::essence_byte(2, 0)]
    );
    drop(picture);

    reader.clear_frame_buffers();
    reader.seek(4);
    assert_eq!(reader.read(1), 0);
    reader.seek(2);
    assert_eq!(reader.read(1), 1);
    let picture = reader.track_reader(0).unwrap();
    assert_eq!(picture.frame_buffer().front().unwrap().position, 2);
}

#[test]
fn test_disabled_track_gets_no_frames() {
    let mut reader = reader_for(&[("clip.mxf", MxfFixture::op1a(3).build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::Success);

    assert!(reader.set_track_enabled(1, false));
    assert!(!reader.set_track_enabled(7, false));
    assert_eq!(reader.read(3), 3);
    assert_eq!(reader.track_reader(0).unwrap().frame_buffer().len(), 3);
    assert!(reader.track_reader(1).unwrap().frame_buffer().is_empty());
}

#[test]
fn test_clip_wrapped_sound() {
    let fixture = MxfFixture {
        operational_pattern: labels::OP_ATOM,
        essence_container: labels::BWF_CLIP_CONTAINER,
        clip_wrapped: true,
        tracks: vec![TrackFixture::sound(1, 1920)],
        ..MxfFixture::op1a(4)
    };
    let mut reader = reader_for(&[("sound.mxf", fixture.build())]);
    assert_eq!(reader.open("sound.mxf"), OpenResult::Success);
    assert_eq!(reader.duration(), 4);

    reader.seek(2);
    assert_eq!(reader.read(2), 2);
    assert_eq!(reader.position(), 4);
    let sound = reader.track_reader(0).unwrap();
    assert_eq!(sound.frame_buffer().len(), 1);
    let frame = sound.frame_buffer().front().unwrap();
    assert_eq!(frame.position, 2);
    assert_eq!(frame.num_samples, 3840);
    assert_eq!(frame.data.len(), 7680);
    assert_eq!(frame.data[0], MxfFixture::essence_byte(2, 0));
    assert_eq!(frame.data[3840], MxfFixture::essence_byte(3, 0));
}

#[test]
fn test_clip_wrapped_read_before_essence_start() {
    let fixture = MxfFixture {
        operational_pattern: labels::OP_ATOM,
        essence_container: labels::BWF_CLIP_CONTAINER,
        clip_wrapped: true,
        tracks: vec![TrackFixture::sound(1, 1920)],
        ..MxfFixture::op1a(4)
    };
    let mut reader = reader_for(&[("sound.mxf", fixture.build())]);
    assert_eq!(reader.open("sound.mxf"), OpenResult::Success);

    reader.set_read_limits(-2, 6, true);
    assert_eq!(reader.position(), -2);
    assert_eq!(reader.read(1), 0);
    assert!(!reader.read_error());
    assert_eq!(reader.position(), -2);
    assert!(reader.track_reader(0).unwrap().frame_buffer().is_empty());

    reader.set_default_read_limits();
    assert_eq!(reader.read(1), 1);
    let sound = reader.track_reader(0).unwrap();
    assert_eq!(sound.frame_buffer().front().unwrap().position, 0);
}

#[test]
fn test_failed_read_sets_error_and_keeps_state() {
    // the index promises two edit units more than the body holds
    let fixture = MxfFixture {
        duration: Some(5),
        index_duration: Some(5),
        ..MxfFixture::op1a(3)
    };
    let mut reader = reader_for(&[("clip.mxf", fixture.build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::Success);
    assert_eq!(reader.read_limits(), (0, 5));

    assert_eq!(reader.read(2), 2);
    assert_eq!(reader.read(2), 0);
    assert!(reader.read_error());
    assert!(!reader.read_error_message().is_empty());
    assert_eq!(reader.position(), 2);
    for track in 0..2 {
        let positions: Vec<i64> = reader
            .track_reader(track)
            .unwrap()
            .frame_buffer()
            .iter()
            .map(|f| f.position)
            .collect();
        assert_eq!(positions, vec![0, 1]);
    }

    // the failure is reported until the next read
    assert!(reader.read_error());
    assert_eq!(reader.read(1), 1);
    assert!(!reader.read_error());
    assert_eq!(reader.position(), 3);
    assert_eq!(reader.track_reader(0).unwrap().frame_buffer().len(), 3);
}

#[test]
fn test_unknown_duration_in_growing_file() {
    let fixture = MxfFixture {
        duration: None,
        complete: false,
        index: IndexFixture::None,
        ..MxfFixture::op1a(3)
    };
    let mut reader = reader_for(&[("growing.mxf", fixture.build())]);
    assert_eq!(reader.open("growing.mxf"), OpenResult::Success);

    assert_eq!(reader.duration(), -1);
    assert!(!reader.is_complete());
    assert_eq!(reader.read_limits(), (0, -1));
    assert_eq!(reader.read(10), 3);
}

#[test]
fn test_complete_file_without_index() {
    let fixture = MxfFixture {
        index: IndexFixture::None,
        ..MxfFixture::op1a(3)
    };
    let mut reader = reader_for(&[("clip.mxf", fixture.build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::NoIndexTable);
    assert_eq!(reader.num_track_readers(), 0);
}

fn assert_not_supported(fixture: MxfFixture) {
    let mut reader = reader_for(&[("clip.mxf", fixture.build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::NotSupported);
    assert_eq!(reader.num_track_readers(), 0);
}

#[test]
fn test_track_referenced_twice_is_not_supported() {
    assert_not_supported(MxfFixture {
        aliased_tracks: vec![1],
        ..MxfFixture::op1a(3)
    });
}

#[test]
fn test_differing_internal_origins_are_not_supported() {
    let mut sound = TrackFixture::sound(2, 1920);
    sound.origin = Some(1);
    assert_not_supported(MxfFixture {
        tracks: vec![TrackFixture::picture(1, 64), sound],
        ..MxfFixture::op1a(3)
    });
}

#[test]
fn test_several_essence_containers_are_not_supported() {
    assert_not_supported(MxfFixture {
        extra_essence_container_data: true,
        ..MxfFixture::op1a(3)
    });
}

#[test]
fn test_start_position_outside_op_atom_is_not_supported() {
    assert_not_supported(MxfFixture {
        material_start_position: 2,
        ..MxfFixture::op1a(3)
    });
}

#[test]
fn test_unsupported_operational_pattern() {
    let fixture = MxfFixture {
        operational_pattern: labels::OP_2A,
        ..MxfFixture::op1a(3)
    };
    let mut reader = reader_for(&[("clip.mxf", fixture.build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::NotSupported);
}

#[test]
fn test_missing_file() {
    let mut reader = reader_for(&[]);
    assert_eq!(reader.open("missing.mxf"), OpenResult::OpenFail);
    assert!(reader.path().is_none());
}

/// Wraps the default resolver and records unregistered files.
struct RecordingResolver {
    inner: DefaultPackageResolver,
    unregistered: Rc<RefCell<Vec<FileId>>>,
}

impl PackageResolver for RecordingResolver {
    fn extract_packages(
        &mut self,
        path: &Path,
        header: &HeaderMetadata,
        reader: Option<Rc<RefCell<MxfFileReader>>>,
    ) -> FileId {
        self.inner.extract_packages(path, header, reader)
    }

    fn resolve_source_clip(
        &mut self,
        clip: &SourceClip,
        locators: Option<&[Locator]>,
        referencing: FileId,
    ) -> Vec<ResolvedPackage> {
        self.inner.resolve_source_clip(clip, locators, referencing)
    }

    fn unregister(&mut self, file_id: FileId) {
        self.unregistered.borrow_mut().push(file_id);
        self.inner.unregister(file_id);
    }

    fn set_external_reader_settings(
        &mut self,
        config: &ReaderConfig,
        log_dispatch: Option<&tracing::Dispatch>,
    ) {
        self.inner.set_external_reader_settings(config, log_dispatch);
    }
}

#[test]
fn test_failed_open_unregisters_and_reader_is_reusable() {
    let target = MxfFixture::op_atom(3, Rational::fps_25());
    let referencing = MxfFixture::reference(vec![ExternalFixture {
        material_track_id: 1,
        data_def: DataDefinition::Picture,
        edit_rate: Rational::fps_25(),
        duration: 3,
        file_uid: target.file_uid,
        file_track_id: 1,
        file_edit_rate: Rational::fps_25(),
        locator: None,
    }]);

    let factory = MemoryFileFactory::new();
    factory.insert("b.mxf", target.build());
    factory.insert("c.mxf", referencing.build());
    factory.insert("a.mxf", MxfFixture::op1a(2).build());

    let mut inner = DefaultPackageResolver::new(Rc::new(factory.clone()));
    let b_id = inner.register_file(Path::new("b.mxf")).unwrap();
    let unregistered = Rc::new(RefCell::new(Vec::new()));
    let mut reader = MxfFileReader::with_factory(factory);
    reader.set_package_resolver(Box::new(RecordingResolver {
        inner,
        unregistered: unregistered.clone(),
    }));

    assert_eq!(reader.open("c.mxf"), OpenResult::NotSupported);
    assert_eq!(unregistered.borrow().len(), 1);
    assert!(!unregistered.borrow().contains(&b_id));
    assert_eq!(reader.num_track_readers(), 0);

    assert_eq!(reader.open("a.mxf"), OpenResult::Success);
    assert_eq!(reader.read(2), 2);
}

fn long_gop_fixture() -> MxfFixture {
    MxfFixture {
        operational_pattern: labels::OP_ATOM,
        essence_container: labels::MPEG_ES_FRAME_CONTAINER,
        tracks: vec![TrackFixture::long_gop_picture(1, 16)],
        duration: Some(4),
        origin: 1,
        index: IndexFixture::Vbe(vec![
            (0, 0, 0xC0),
            (1, 0, 0x22),
            (-1, -2, 0x33),
            (0, -3, 0x22),
            (0, -4, 0x33),
        ]),
        ..MxfFixture::op1a(5)
    }
}

#[test]
fn test_long_gop_precharge() {
    let mut reader = reader_for(&[("gop.mxf", long_gop_fixture().build())]);
    assert_eq!(reader.open("gop.mxf"), OpenResult::Success);

    assert_eq!(reader.origin(), 1);
    assert_eq!(reader.duration(), 4);
    assert_eq!(reader.max_precharge(0, false).unwrap(), -1);
    assert_eq!(reader.max_precharge(0, true).unwrap(), -1);
    assert_eq!(reader.max_rollout(3, false).unwrap(), 0);
    assert_eq!(reader.max_read_limits().unwrap(), (-1, 5));
    assert_eq!(reader.read_limits(), (-1, 5));
    assert_eq!(reader.position(), -1);

    assert_eq!(reader.read(10), 5);
    let picture = reader.track_reader(0).unwrap();
    let first = picture.frame_buffer().front().unwrap();
    assert_eq!(first.position, -1);
    assert_eq!(first.data[0], MxfFixture::essence_byte(0, 0));
    assert_eq!(first.temporal_offset, 0);
    assert_eq!(picture.frame_buffer().back().unwrap().key_frame_offset, -4);
}

#[test]
fn test_intra_only_essence_has_no_precharge() {
    let fixture = MxfFixture {
        tracks: vec![TrackFixture::picture(1, 16)],
        ..long_gop_fixture()
    };
    let mut reader = reader_for(&[("intra.mxf", fixture.build())]);
    assert_eq!(reader.open("intra.mxf"), OpenResult::Success);

    assert!(reader.is_complete());
    assert_eq!(reader.max_precharge(0, false).unwrap(), 0);
    assert_eq!(reader.max_precharge(0, true).unwrap(), 0);
    assert_eq!(reader.max_rollout(0, false).unwrap(), 0);
    assert_eq!(reader.max_rollout(3, true).unwrap(), 0);
    assert_eq!(reader.max_read_limits().unwrap(), (0, 4));
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_precharge_needs_complete_file() {
    let fixture = MxfFixture {
        complete: false,
        index: IndexFixture::None,
        ..long_gop_fixture()
    };
    let mut reader = reader_for(&[("gop.mxf", fixture.build())]);
    assert_eq!(reader.open("gop.mxf"), OpenResult::Success);

    assert!(!reader.is_complete());
    assert!(matches!(
        reader.max_precharge(0, false),
        Err(MxfError::Precondition(_))
    ));
}

#[test]
fn test_non_seekable_stream() {
    let bytes = MxfFixture::op1a(4).build();
    let mut reader = MxfFileReader::new();
    let stream = NonSeekableStream::new(Cursor::new(bytes));
    assert_eq!(
        reader.open_stream(Box::new(stream), "pipe.mxf"),
        OpenResult::Success
    );

    assert!(!reader.is_seekable());
    assert!(!reader.is_complete());
    assert_eq!(reader.read(10), 4);
    let sound = reader.track_reader(1).unwrap();
    let data: Vec<u8> = sound.frame_buffer().iter().map(|f| f.data[0]).collect();
    assert_eq!(
        data,
        (0..4)
            .map(|unit| MxfFixture::essence_byte(unit, 1))
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_material_and_physical_source_timecodes() {
    let fixture = MxfFixture {
        material_timecode: Some(TimecodeFixture::new(25, 90_000)),
        file_source_clip: FileSourceClip::Physical(PhysicalFixture {
            uid: Umid::generate(),
            name: "TAPE01".into(),
            timecode: TimecodeFixture::new(25, 900_000),
            start_position: 50,
        }),
        ..MxfFixture::op1a(3)
    };
    let mut reader = reader_for(&[("clip.mxf", fixture.build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::Success);

    assert!(reader.have_material_timecode());
    assert_eq!(reader.material_timecode(0).unwrap().to_string(), "01:00:00:00");
    assert_eq!(reader.material_timecode(26).unwrap().to_string(), "01:00:01:01");
    assert!(!reader.have_file_source_timecode());
    assert!(reader.have_physical_source_timecode());
    assert_eq!(
        reader.physical_source_timecode(0).unwrap().to_string(),
        "10:00:02:00"
    );
    assert_eq!(reader.physical_source_package_name(), Some("TAPE01"));
}

#[test]
fn test_source_clip_cycle_is_ignored() {
    let fixture = MxfFixture {
        file_timecode: Some(TimecodeFixture::new(25, 0)),
        file_source_clip: FileSourceClip::MaterialPackage,
        ..MxfFixture::op1a(2)
    };
    let mut reader = reader_for(&[("clip.mxf", fixture.build())]);
    assert_eq!(reader.open("clip.mxf"), OpenResult::Success);

    assert!(reader.have_file_source_timecode());
    assert_eq!(reader.file_source_timecode(3).unwrap().to_string(), "00:00:00:03");
    assert!(!reader.have_physical_source_timecode());
    assert_eq!(reader.physical_source_package_name(), None);
}

fn double_rate_pair(internal_units: usize) -> (MxfFixture, MxfFixture) {
    let external = MxfFixture::op_atom(10, Rational::fps_50());
    let referencing = MxfFixture {
        tracks: vec![TrackFixture::picture(1, 64)],
        externals: vec![ExternalFixture {
            material_track_id: 2,
            data_def: DataDefinition::Picture,
            edit_rate: Rational::fps_50(),
            duration: 10,
            file_uid: external.file_uid,
            file_track_id: 1,
            file_edit_rate: Rational::fps_50(),
            locator: Some("b.mxf".into()),
        }],
        ..MxfFixture::op1a(internal_units)
    };
    (referencing, external)
}

#[test]
fn test_external_essence_at_double_rate() {
    let (referencing, external) = double_rate_pair(5);
    let mut reader = reader_for(&[("a.mxf", referencing.build()), ("b.mxf", external.build())]);
    assert_eq!(reader.open("a.mxf"), OpenResult::Success);

    assert_eq!(reader.edit_rate(), Rational::fps_25());
    assert_eq!(reader.duration(), 5);
    assert_eq!(reader.num_track_readers(), 2);
    {
        let external_track = reader.track_reader(1).unwrap();
        assert_eq!(external_track.info().material_track_id, 2);
        assert_eq!(external_track.info().material_package_uid, referencing.material_uid);
        assert_eq!(external_track.info().file_package_uid, external.file_uid);
    }

    assert_eq!(reader.read(5), 5);
    assert_eq!(reader.position(), 5);
    assert_eq!(reader.track_reader(0).unwrap().frame_buffer().len(), 5);
    let external_track = reader.track_reader(1).unwrap();
    let positions: Vec<i64> = external_track
        .frame_buffer()
        .iter()
        .map(|f| f.position)
        .collect();
    assert_eq!(positions, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_read_reports_most_advanced_track() {
    let (referencing, external) = double_rate_pair(3);
    let mut reader = reader_for(&[("a.mxf", referencing.build()), ("b.mxf", external.build())]);
    assert_eq!(reader.open("a.mxf"), OpenResult::Success);
    assert_eq!(reader.duration(), 3);

    reader.set_read_limits(0, 5, true);
    assert_eq!(reader.read(3), 3);

    // the internal essence has ended, the external file still advances
    assert_eq!(reader.read(1), 1);
    assert_eq!(reader.position(), 4);
    assert_eq!(reader.read(1), 1);
    assert_eq!(reader.read(1), 0);
    assert!(!reader.read_error());
    assert_eq!(reader.position(), 5);

    assert_eq!(reader.track_reader(0).unwrap().frame_buffer().len(), 3);
    let external_track = reader.track_reader(1).unwrap();
    let positions: Vec<i64> = external_track
        .frame_buffer()
        .iter()
        .map(|f| f.position)
        .collect();
    assert_eq!(positions, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_unknown_external_duration_makes_clip_duration_unknown() {
    let external = MxfFixture {
        duration: None,
        complete: false,
        index: IndexFixture::None,
        ..MxfFixture::op_atom(4, Rational::fps_25())
    };
    let referencing = MxfFixture {
        tracks: vec![TrackFixture::picture(1, 64)],
        externals: vec![ExternalFixture {
            material_track_id: 2,
            data_def: DataDefinition::Picture,
            edit_rate: Rational::fps_25(),
            duration: -1,
            file_uid: external.file_uid,
            file_track_id: 1,
            file_edit_rate: Rational::fps_25(),
            locator: Some("b.mxf".into()),
        }],
        ..MxfFixture::op1a(3)
    };
    let mut reader = reader_for(&[("a.mxf", referencing.build()), ("b.mxf", external.build())]);
    assert_eq!(reader.open("a.mxf"), OpenResult::Success);

    assert_eq!(reader.duration(), -1);
    assert!(!reader.is_complete());
    assert_eq!(reader.read_limits(), (0, -1));
    assert!(matches!(
        reader.max_read_limits(),
        Err(MxfError::Precondition(_))
    ));
    assert_eq!(reader.read(10), 4);
    assert_eq!(reader.read(1), 0);
    assert!(!reader.read_error());
}

#[test]
fn test_nested_external_files_open_through_the_same_factory() {
    let (mut b, c) = double_rate_pair(5);
    b.externals[0].locator = Some("c.mxf".into());
    let factory = MemoryFileFactory::new();
    factory.insert("media/b.mxf", b.build());
    factory.insert("media/c.mxf", c.build());

    let config = ReaderConfig {
        max_frame_info_frames: 12,
        ..ReaderConfig::default()
    };
    let mut resolver = DefaultPackageResolver::new(Rc::new(factory));
    resolver.set_external_reader_settings(&config, None);
    let file_id = resolver.register_file(Path::new("media/b.mxf")).unwrap();

    let external = resolver.file_reader(file_id).unwrap();
    let external = external.borrow();
    assert_eq!(external.config(), &config);
    assert_eq!(external.num_track_readers(), 2);
    assert_eq!(
        external.track_reader(1).unwrap().info().file_package_uid,
        c.file_uid
    );
}

fn st436_anc(line_count: u16) -> Vec<u8> {
    let mut data = line_count.to_be_bytes().to_vec();
    data.extend_from_slice(&9u16.to_be_bytes());
    data.extend_from_slice(&[1, 4]);
    data.extend_from_slice(&3u16.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&3u32.to_be_bytes());
    data.extend_from_slice(&[0x41, 0x05, 0x08]);
    data
}

fn anc_fixture(payloads: Vec<Vec<u8>>) -> MxfFixture {
    MxfFixture {
        tracks: vec![TrackFixture::picture(1, 64), TrackFixture::anc(2, payloads)],
        ..MxfFixture::op1a(3)
    }
}

#[test]
fn test_frame_info_failure_after_success_is_tolerated() {
    // the second element claims a line it does not carry
    let fixture = anc_fixture(vec![st436_anc(1), st436_anc(2), st436_anc(1)]);
    let mut reader = reader_for(&[("anc.mxf", fixture.build())]);
    assert_eq!(reader.open("anc.mxf"), OpenResult::Success);

    assert_eq!(reader.read(1), 1);
    assert!(!reader.read_error());
    assert_eq!(reader.position(), 1);

    let anc = reader.track_reader(1).unwrap();
    assert_eq!(anc.info().data_def, DataDefinition::Data);
    assert_eq!(anc.frame_buffer().len(), 1);
    let TrackDetails::Data(data) = &anc.info().details else {
        panic!("expected data track details");
    };
    assert_eq!(
        data.anc_manifest,
        vec![AncManifestElement {
            line_number: 9,
            wrapping_type: 1,
            sample_coding: 4,
            did: 0x41,
            sdid: 0x05,
        }]
    );
}

#[test]
fn test_frame_info_failure_on_first_frame_fails_read() {
    let fixture = anc_fixture(vec![st436_anc(2), st436_anc(1), st436_anc(1)]);
    let mut reader = reader_for(&[("anc.mxf", fixture.build())]);
    assert_eq!(reader.open("anc.mxf"), OpenResult::Success);

    assert_eq!(reader.read(1), 0);
    assert!(reader.read_error());
    assert_eq!(reader.position(), 0);
    assert!(reader.track_reader(0).unwrap().frame_buffer().is_empty());
    assert!(reader.track_reader(1).unwrap().frame_buffer().is_empty());

    let mut config = ReaderConfig::default();
    config.extract_frame_info = false;
    reader.set_config(config);
    assert_eq!(reader.read(1), 1);
    assert!(!reader.read_error());
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_log_dispatch_receives_open_failure() {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let fixture = MxfFixture {
        index: IndexFixture::None,
        ..MxfFixture::op1a(2)
    };
    let mut reader = reader_for(&[("clip.mxf", fixture.build())]);
    reader.set_log_dispatch(tracing::Dispatch::new(subscriber));
    assert_eq!(reader.open("clip.mxf"), OpenResult::NoIndexTable);

    let log = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert!(log.contains("failed to open MXF file"), "log: {log}");
}

#[test]
fn test_external_reader_logs_to_the_same_dispatch() {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let dispatch = tracing::Dispatch::new(subscriber);

    let (referencing, external) = double_rate_pair(5);
    let mut reader = reader_for(&[("a.mxf", referencing.build()), ("b.mxf", external.build())]);
    reader.set_log_dispatch(dispatch);
    assert_eq!(reader.open("a.mxf"), OpenResult::Success);
    assert_eq!(reader.read(1), 1);

    let log = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert!(log.contains("/b.mxf"), "log: {log}");
    assert_eq!(log.matches("opened MXF file").count(), 2, "log: {log}");
}
