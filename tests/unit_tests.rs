mod common;

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::path::{Path, PathBuf};

    use super::common::{container, FrameFixture};
    use smd2voc::container::video_id_from_file_name;
    use smd2voc::conversion::{ClassLabel, DETECTION_HEADER};
    use smd2voc::frame::{image_name, GT_VARIABLE};
    use smd2voc::io::{legacy_output_name, write_detection_csv, write_rows_as_lines};
    use smd2voc::mat::{MatArray, NumericArray};
    use smd2voc::types::{format_real, Coord, ImageSize};
    use smd2voc::voc::{document_file_name, XmlElement};
    use smd2voc::{
        emit_document, emit_row, locate, normalize, reconstruct, save_document, Bucket,
        ClassColumn, ConvertError, CoordMode, DocumentTarget, FrameRecord, Membership,
        ObjectClass, ObjectEntry, Row, Schema,
    };

    fn record(boxes: &[[f64; 4]], classes: &[i64], motion: &[f64], distances: &[f64]) -> FrameRecord {
        FrameRecord {
            video_id: "V1".to_string(),
            frame_index: 0,
            image_name: image_name("V1", 0),
            bounding_boxes: boxes.to_vec(),
            object_classes: classes.to_vec(),
            motion_flags: motion.to_vec(),
            distances: distances.to_vec(),
        }
    }

    fn entry(bbox: [f64; 4], class_code: i64, coords: CoordMode) -> ObjectEntry {
        ObjectEntry {
            image_name: "V1_frame0.jpg".to_string(),
            bbox: bbox.into(),
            class_code,
            motion: 1.0,
            distance: 120.5,
            coords,
        }
    }

    #[test]
    fn test_video_id_from_file_name() {
        assert_eq!(
            video_id_from_file_name("MVI_1448_VIS_ObjectGT.mat"),
            Some("MVI_1448_VIS".to_string())
        );
        assert_eq!(
            video_id_from_file_name("MVI_0790_NIR.mat"),
            Some("MVI_0790_NIR".to_string())
        );
        assert_eq!(
            video_id_from_file_name("V1_ObjectGT.tar.gz"),
            Some("V1".to_string())
        );
        assert_eq!(video_id_from_file_name(".DS_Store"), None);
        assert_eq!(video_id_from_file_name("_ObjectGT.mat"), None);
    }

    #[test]
    fn test_locate_maps_regular_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        File::create(dir.join("V2_ObjectGT.mat")).unwrap();
        File::create(dir.join("V1_ObjectGT.mat")).unwrap();
        File::create(dir.join(".hidden")).unwrap();
        fs::create_dir(dir.join("V3_ObjectGT.mat")).unwrap();

        let located = locate(dir).unwrap();
        let ids: Vec<_> = located.keys().cloned().collect();
        assert_eq!(ids, vec!["V1", "V2"]);
        assert_eq!(located["V1"], dir.join("V1_ObjectGT.mat"));
    }

    #[test]
    fn test_locate_missing_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("NIR/ObjectGT");
        match locate(&missing) {
            Err(ConvertError::NotFound(path)) => assert_eq!(path, missing),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_locate_empty_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(locate(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_reconstruct_frames() {
        let gt = container(
            "V1",
            &[
                FrameFixture::with_objects(&[[10.0, 20.0, 5.0, 5.0], [30.0, 40.0, 6.0, 7.0]], &[3.0, 0.0]),
                FrameFixture::empty(),
            ],
        );

        let frames = reconstruct(&gt).unwrap();
        assert_eq!(frames.len(), 2);

        assert_eq!(frames[0].image_name, "V1_frame0.jpg");
        assert_eq!(frames[0].frame_index, 0);
        assert_eq!(frames[0].object_count(), 2);
        assert_eq!(frames[0].object_classes, vec![3, 0]);
        assert_eq!(frames[0].bounding_boxes[1], [30.0, 40.0, 6.0, 7.0]);
        assert_eq!(frames[0].distances, vec![100.0, 100.0]);

        assert_eq!(frames[1].image_name, "V1_frame1.jpg");
        assert_eq!(frames[1].object_count(), 0);
        assert!(frames[1].bounding_boxes.is_empty());
    }

    #[test]
    fn test_reconstruct_zero_frames() {
        let gt = container("V1", &[]);
        assert!(reconstruct(&gt).unwrap().is_empty());
    }

    #[test]
    fn test_reconstruct_empty_objects_ignore_other_fields() {
        let frame = FrameFixture {
            boxes: vec![[1.0, 2.0, 3.0, 4.0]],
            objects: Vec::new(),
            motion: vec![1.0],
            distance: vec![50.0],
        };
        let frames = reconstruct(&container("V1", &[frame])).unwrap();
        assert_eq!(frames[0].object_count(), 0);
        assert!(frames[0].bounding_boxes.is_empty());
        assert!(frames[0].distances.is_empty());
    }

    #[test]
    fn test_reconstruct_missing_variable() {
        let mut gt = container("V1", &[FrameFixture::empty()]);
        gt.variables.remove(GT_VARIABLE);
        assert!(matches!(
            reconstruct(&gt),
            Err(ConvertError::MalformedContainer { .. })
        ));
    }

    #[test]
    fn test_reconstruct_wrong_variable_type() {
        let mut gt = container("V1", &[]);
        gt.variables.insert(
            GT_VARIABLE.to_string(),
            MatArray::Numeric(NumericArray::column(&[1.0])),
        );
        assert!(matches!(
            reconstruct(&gt),
            Err(ConvertError::MalformedContainer { .. })
        ));
    }

    #[test]
    fn test_reconstruct_missing_field() {
        let mut gt = container("V1", &[FrameFixture::with_objects(&[[1.0, 2.0, 3.0, 4.0]], &[1.0])]);
        if let Some(MatArray::Struct(frames)) = gt.variables.get_mut(GT_VARIABLE) {
            frames.field_names.truncate(3);
            for element in &mut frames.elements {
                element.truncate(3);
            }
        }
        match reconstruct(&gt) {
            Err(ConvertError::MalformedContainer { reason, .. }) => {
                assert!(reason.contains("Distance"), "{}", reason)
            }
            other => panic!("expected MalformedContainer, got {:?}", other),
        }
    }

    #[test]
    fn test_reconstruct_rejects_narrow_boxes() {
        let mut gt = container("V1", &[FrameFixture::with_objects(&[[1.0, 2.0, 3.0, 4.0]], &[1.0])]);
        if let Some(MatArray::Struct(frames)) = gt.variables.get_mut(GT_VARIABLE) {
            frames.elements[0][0] = MatArray::Numeric(NumericArray::from_rows(&[[1.0, 2.0, 3.0]]));
        }
        assert!(matches!(
            reconstruct(&gt),
            Err(ConvertError::MalformedContainer { .. })
        ));
    }

    #[test]
    fn test_normalize_drops_sentinel_class() {
        let frame = record(
            &[[10.0, 20.0, 5.0, 5.0], [30.0, 40.0, 6.0, 7.0]],
            &[3, 0],
            &[1.0, 0.0],
            &[120.5, 80.0],
        );
        let entries = normalize(&frame, CoordMode::Real).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].class_code, 3);
        assert_eq!(entries[0].bbox.x_min, 10.0);
        assert_eq!(entries[0].distance, 120.5);
        assert_eq!(entries[0].image_name, "V1_frame0.jpg");
    }

    #[test]
    fn test_normalize_keeps_input_order() {
        let frame = record(
            &[[1.0, 1.0, 1.0, 1.0], [2.0, 2.0, 2.0, 2.0], [3.0, 3.0, 3.0, 3.0]],
            &[7, 0, 2],
            &[0.0, 0.0, 1.0],
            &[10.0, 20.0, 30.0],
        );
        let codes: Vec<_> = normalize(&frame, CoordMode::Real)
            .unwrap()
            .iter()
            .map(|entry| entry.class_code)
            .collect();
        assert_eq!(codes, vec![7, 2]);
    }

    #[test]
    fn test_normalize_empty_frame() {
        let frame = record(&[], &[], &[], &[]);
        assert!(normalize(&frame, CoordMode::Integer).unwrap().is_empty());
    }

    #[test]
    fn test_normalize_rejects_length_mismatch() {
        let frame = record(&[[10.0, 20.0, 5.0, 5.0]], &[3, 4], &[1.0, 1.0], &[5.0, 6.0]);
        match normalize(&frame, CoordMode::Real) {
            Err(ConvertError::InconsistentRecord { image_name, reason }) => {
                assert_eq!(image_name, "V1_frame0.jpg");
                assert!(reason.contains("BB"), "{}", reason);
            }
            other => panic!("expected InconsistentRecord, got {:?}", other),
        }

        let frame = record(&[[10.0, 20.0, 5.0, 5.0]], &[3], &[1.0], &[]);
        assert!(matches!(
            normalize(&frame, CoordMode::Real),
            Err(ConvertError::InconsistentRecord { .. })
        ));
    }

    #[test]
    fn test_emit_row_integer_legacy() {
        let row = emit_row(
            &entry([10.7, 20.2, 5.4, 5.9], 3, CoordMode::Integer),
            Schema::Legacy,
            ClassColumn::Code,
        )
        .unwrap();
        assert_eq!(row.to_line(), "V1_frame0.jpg,10,20,5,5,3,120.5,1.0");
    }

    #[test]
    fn test_emit_row_integer_detection_truncates_after_sum() {
        let row = emit_row(
            &entry([10.7, 20.2, 5.4, 5.9], 3, CoordMode::Integer),
            Schema::Detection,
            ClassColumn::Code,
        )
        .unwrap();
        match &row {
            Row::Detection(detection) => {
                assert_eq!(detection.xmin, Coord::Int(10));
                assert_eq!(detection.ymin, Coord::Int(20));
                assert_eq!(detection.width, Coord::Int(5));
                assert_eq!(detection.height, Coord::Int(5));
                assert_eq!(detection.xmax, Coord::Int(16));
                assert_eq!(detection.ymax, Coord::Int(26));
                assert_eq!(detection.class, ClassLabel::Code(3));
            }
            other => panic!("expected a detection row, got {:?}", other),
        }
        assert_eq!(row.to_line(), "V1_frame0.jpg,5,5,3,10,20,16,26");
    }

    #[test]
    fn test_emit_row_real_corners() {
        let bbox = [10.5, 20.25, 5.5, 4.75];
        let row = emit_row(&entry(bbox, 3, CoordMode::Real), Schema::Detection, ClassColumn::Code)
            .unwrap();
        let Row::Detection(detection) = &row else {
            panic!("expected a detection row, got {:?}", row);
        };
        match (detection.xmin, detection.xmax, detection.ymin, detection.ymax) {
            (Coord::Real(xmin), Coord::Real(xmax), Coord::Real(ymin), Coord::Real(ymax)) => {
                assert_eq!(xmin, bbox[0]);
                assert_eq!(ymin, bbox[1]);
                assert_eq!(xmax - xmin, bbox[2]);
                assert_eq!(ymax - ymin, bbox[3]);
            }
            other => panic!("expected real corners, got {:?}", other),
        }
        assert_eq!(row.to_line(), "V1_frame0.jpg,5.5,4.75,3,10.5,20.25,16.0,25.0");
    }

    #[test]
    fn test_emit_row_class_name_column() {
        let row = emit_row(
            &entry([1.0, 2.0, 3.0, 4.0], 7, CoordMode::Real),
            Schema::Detection,
            ClassColumn::Name,
        )
        .unwrap();
        assert_eq!(row.to_line(), "V1_frame0.jpg,3.0,4.0,Sail boat,1.0,2.0,4.0,6.0");

        let unknown = emit_row(
            &entry([1.0, 2.0, 3.0, 4.0], 11, CoordMode::Real),
            Schema::Detection,
            ClassColumn::Name,
        );
        assert!(matches!(unknown, Err(ConvertError::UnknownClassCode(11))));
    }

    #[test]
    fn test_object_class_vocabulary() {
        let names: Vec<_> = (1..=10)
            .map(|code| ObjectClass::try_from(code).unwrap().name())
            .collect();
        assert_eq!(
            names,
            vec![
                "Ferry",
                "Buoy",
                "Vessel/ship",
                "Speed boat",
                "Boat",
                "Kayak",
                "Sail boat",
                "Swimming person",
                "Flying bird/plane",
                "Other",
            ]
        );
        assert!(matches!(
            ObjectClass::try_from(0),
            Err(ConvertError::UnknownClassCode(0))
        ));
        assert!(matches!(
            ObjectClass::try_from(11),
            Err(ConvertError::UnknownClassCode(11))
        ));
    }

    #[test]
    fn test_format_real() {
        assert_eq!(format_real(10.0), "10.0");
        assert_eq!(format_real(-3.0), "-3.0");
        assert_eq!(format_real(120.5), "120.5");
        assert_eq!(format_real(0.0), "0.0");
    }

    #[test]
    fn test_membership_routing() {
        let membership = Membership::new(["a.jpg", "both.jpg"], ["b.jpg", "both.jpg"]);
        assert_eq!(membership.bucket_of("a.jpg"), Some(Bucket::Train));
        assert_eq!(membership.bucket_of("b.jpg"), Some(Bucket::Test));
        assert_eq!(membership.bucket_of("both.jpg"), Some(Bucket::Train));
        assert_eq!(membership.bucket_of("c.jpg"), None);
    }

    #[test]
    fn test_emit_document_unknown_class() {
        let entries = vec![
            entry([1.0, 2.0, 3.0, 4.0], 3, CoordMode::Real),
            entry([5.0, 6.0, 7.0, 8.0], 11, CoordMode::Real),
        ];
        let result = emit_document(
            "V1_frame0.jpg",
            &entries,
            ImageSize::default(),
            Path::new("/frames/train"),
        );
        assert!(matches!(result, Err(ConvertError::UnknownClassCode(11))));
    }

    #[test]
    fn test_emit_document_fields() {
        let entries = vec![entry([10.7, 20.2, 5.4, 5.9], 3, CoordMode::Integer)];
        let image_dir = PathBuf::from("/frames/train");
        let document =
            emit_document("V1_frame0.jpg", &entries, ImageSize::default(), &image_dir).unwrap();

        assert_eq!(document.folder, "train");
        assert_eq!(document.filename, "V1_frame0.jpg");
        assert_eq!(
            document.path,
            image_dir.join("V1_frame0.jpg").to_string_lossy()
        );
        assert_eq!(document.size, ImageSize { width: 1920, height: 1080, depth: 3 });
        assert_eq!(document.objects.len(), 1);
        assert_eq!(document.objects[0].name, "Vessel/ship");
        assert_eq!(document.objects[0].bndbox.xmax, Coord::Int(16));

        let root = document.to_element();
        assert_eq!(root.name, "annotation");
        let text_of = |element: Option<&XmlElement>| element.and_then(|e| e.text.clone());
        assert_eq!(text_of(root.find("folder")), Some("train".to_string()));
        assert_eq!(
            text_of(root.find("source").and_then(|source| source.find("database"))),
            Some("Unknown".to_string())
        );
        let bndbox = root
            .find("object")
            .and_then(|object| object.find("bndbox"))
            .unwrap();
        let corners: Vec<_> = bndbox.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(corners, vec!["xmin", "ymin", "xmax", "ymax"]);
        assert_eq!(text_of(bndbox.find("ymax")), Some("26".to_string()));
        assert!(root.find("missing").is_none());

        let xml = document.to_xml().unwrap();
        assert!(xml.starts_with("<annotation>\n\t<folder>train</folder>\n"));
        assert!(xml.contains("\t<source>\n\t\t<database>Unknown</database>\n\t</source>\n"));
        assert!(xml.contains("\t\t<width>1920</width>\n\t\t<height>1080</height>\n\t\t<depth>3</depth>\n"));
        assert!(xml.contains("\t<segmented>Unspecified</segmented>\n"));
        assert!(xml.contains("\t\t<name>Vessel/ship</name>\n"));
        assert!(xml.contains("\t\t<occluded>Unspecified</occluded>\n"));
        assert!(xml.contains(
            "\t\t<bndbox>\n\t\t\t<xmin>10</xmin>\n\t\t\t<ymin>20</ymin>\n\t\t\t<xmax>16</xmax>\n\t\t\t<ymax>26</ymax>\n\t\t</bndbox>\n"
        ));
        assert!(xml.ends_with("</annotation>\n"));
    }

    #[test]
    fn test_emit_document_without_objects() {
        let document =
            emit_document("V1_frame3.jpg", &[], ImageSize::default(), Path::new("test")).unwrap();
        assert!(document.objects.is_empty());
        assert!(!document.to_xml().unwrap().contains("<object>"));
    }

    #[test]
    fn test_document_escapes_text() {
        let document =
            emit_document("a&b.jpg", &[], ImageSize::default(), Path::new("R&D")).unwrap();
        let xml = document.to_xml().unwrap();
        assert!(xml.contains("<folder>R&amp;D</folder>"));
        assert!(xml.contains("<filename>a&amp;b.jpg</filename>"));
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(document_file_name("V1_frame0.jpg"), "V1_frame0.xml");
        assert_eq!(document_file_name("MVI_1448_VIS_frame12.jpg"), "MVI_1448_VIS_frame12.xml");
    }

    #[test]
    fn test_save_document_writes_xml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let image_dir = temp_dir.path().join("train");
        let annotation_dir = temp_dir.path().join("train_annotations");
        fs::create_dir_all(&annotation_dir).unwrap();

        let entries = vec![entry([1.0, 2.0, 3.0, 4.0], 1, CoordMode::Real)];
        let document =
            emit_document("V1_frame0.jpg", &entries, ImageSize::default(), &image_dir).unwrap();
        let target = DocumentTarget::new(&image_dir, &annotation_dir);

        let written = save_document(&document, &target).unwrap();
        let expected = annotation_dir.join("V1_frame0.xml");
        assert_eq!(written, Some(expected.clone()));
        assert_eq!(fs::read_to_string(expected).unwrap(), document.to_xml().unwrap());
    }

    #[test]
    fn test_save_document_skips_blank_paths() {
        let temp_dir = tempfile::tempdir().unwrap();
        let document =
            emit_document("V1_frame0.jpg", &[], ImageSize::default(), Path::new("train")).unwrap();

        let no_images = DocumentTarget::new("", temp_dir.path());
        assert_eq!(save_document(&document, &no_images).unwrap(), None);

        let no_annotations = DocumentTarget::new(temp_dir.path(), " ");
        assert_eq!(save_document(&document, &no_annotations).unwrap(), None);

        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_legacy_output_name() {
        assert_eq!(legacy_output_name("NIR/ObjectGT"), "objects_nir.txt");
        assert_eq!(legacy_output_name("VIS_Onshore/ObjectGT"), "objects_onshore.txt");
        assert_eq!(legacy_output_name("VIS_Onboard/ObjectGT"), "objects_onboard.txt");
    }

    #[test]
    fn test_write_detection_csv() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("train_labels.csv");
        let rows = vec![
            emit_row(&entry([10.7, 20.2, 5.4, 5.9], 3, CoordMode::Integer), Schema::Detection, ClassColumn::Code)
                .unwrap(),
            emit_row(&entry([1.0, 2.0, 3.0, 4.0], 5, CoordMode::Integer), Schema::Detection, ClassColumn::Code)
                .unwrap(),
        ];

        write_detection_csv(&path, &rows).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], DETECTION_HEADER.join(","));
        assert_eq!(lines[1], "V1_frame0.jpg,5,5,3,10,20,16,26");
        assert_eq!(lines[2], "V1_frame0.jpg,3,4,5,1,2,4,6");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_write_detection_csv_header_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test_labels.csv");
        write_detection_csv(&path, &[]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "filename,width,height,class,xmin,ymin,xmax,ymax\n"
        );
    }

    #[test]
    fn test_write_rows_as_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("objects_nir.txt");
        let rows = vec![emit_row(
            &entry([10.0, 20.0, 5.0, 5.0], 3, CoordMode::Real),
            Schema::Legacy,
            ClassColumn::Code,
        )
        .unwrap()];

        write_rows_as_lines(&path, &rows).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "V1_frame0.jpg,10.0,20.0,5.0,5.0,3,120.5,1.0\n"
        );
    }
}
