use std::{collections::BTreeSet, io::Cursor, sync::Arc, time::Duration};

use actix_web::{http::StatusCode, web::Bytes, ResponseError};
use image::{DynamicImage, ImageFormat, RgbImage};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::{
    error::{Error, UploadError},
    import::{tiff_block, with_exif},
    metadata::Metadata,
    repo::{
        sled::SledRepo, ArcRepo, CollectionRepo, Descriptor, Photo, PhotoId, PhotoRepo, Role,
        User, UserId,
    },
    state::State,
    store::{
        file_store::{count_files, FileStore},
        Store,
    },
};

use super::{collection_name, upload_batch, BatchError};

struct Harness {
    root: tempfile::TempDir,
    state: State<FileStore>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(f: impl FnOnce(&mut crate::config::Configuration)) -> Self {
        let root = tempfile::tempdir().expect("Created tempdir");

        let mut config = crate::config::testing(root.path());
        f(&mut config);

        let db = sled::Config::new()
            .temporary(true)
            .open()
            .expect("Opened temporary db");
        let repo: ArcRepo = Arc::new(SledRepo::new(db).expect("Opened trees"));

        let store = FileStore::build(root.path().join("images"), root.path().join("thumbnails"))
            .await
            .expect("Built store");

        let state = State::build(config, repo, store)
            .await
            .expect("Built state");

        Harness { root, state }
    }

    fn stored_files(&self) -> (usize, usize) {
        (
            count_files(&self.root.path().join("images")),
            count_files(&self.root.path().join("thumbnails")),
        )
    }

    async fn store_usage(&self, owner: UserId, used_space: u64) {
        let now = OffsetDateTime::now_utc();

        let existing = Photo {
            id: PhotoId::generate(),
            owner,
            descriptor: Descriptor {
                filename: String::from("existing.jpg"),
                uploaded_at: now,
                format: String::from("jpg"),
                tags: BTreeSet::new(),
                favorite: false,
                metadata: Metadata::empty(now),
            },
            used_space,
            content_hash: String::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        self.state
            .repo
            .create_photo(&existing)
            .await
            .expect("Stored usage");
    }

    async fn photo(&self, id: PhotoId) -> Photo {
        self.state
            .repo
            .photo(id)
            .await
            .expect("Read photo")
            .expect("Photo exists")
    }
}

fn user(quota: i64) -> User {
    User {
        id: UserId::generate(),
        name: String::from("photographer"),
        role: Role {
            name: String::from("member"),
            quota,
        },
    }
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
    }));

    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, format)
        .expect("Encoded test image");
    cursor.into_inner()
}

fn file(name: &str, bytes: Vec<u8>) -> (String, Bytes) {
    (name.to_string(), Bytes::from(bytes))
}

fn batch_error(error: &Error) -> &BatchError {
    match error.kind() {
        Some(UploadError::Batch(e)) => e,
        other => panic!("Expected batch error, got {other:?}"),
    }
}

#[tokio::test]
async fn jpeg_exif_is_stored() {
    let harness = Harness::new().await;
    let user = user(0);

    let tiff = tiff_block("TestCam", (28, 10), 100, (6, 1));
    let bytes = with_exif(&encode(64, 48, ImageFormat::Jpeg), &tiff);

    let collection = upload_batch(&harness.state, &user, vec![file("IMG_0001.JPG", bytes.clone())])
        .await
        .expect("Uploaded");

    assert_eq!(collection.photo_ids.len(), 1);
    let photo = harness.photo(collection.photo_ids[0]).await;

    assert_eq!(photo.owner, user.id);
    assert_eq!(photo.descriptor.filename, "IMG_0001.JPG");
    assert_eq!(photo.descriptor.format, "jpg");
    assert_eq!(photo.descriptor.metadata.aperture, 2.8);
    assert_eq!(photo.descriptor.metadata.iso, 100);
    assert_eq!(photo.descriptor.metadata.camera_make, "TestCam");
    assert_eq!(photo.content_hash, hex::encode(Sha256::digest(&bytes)));

    let image = harness
        .state
        .store
        .load_image(photo.id)
        .await
        .expect("Loaded image");
    let thumbnail = harness
        .state
        .store
        .load_thumbnail(photo.id)
        .await
        .expect("Loaded thumbnail");

    assert_eq!(image, bytes);
    assert_eq!(photo.used_space, (image.len() + thumbnail.len()) as u64);
}

#[tokio::test]
async fn unsupported_format_writes_nothing() {
    let harness = Harness::new().await;
    let user = user(0);

    let err = upload_batch(
        &harness.state,
        &user,
        vec![file("notes.xyz", encode(16, 16, ImageFormat::Png))],
    )
    .await
    .expect_err("Rejected");

    assert!(matches!(batch_error(&err), BatchError::UnsupportedFormat));
    assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(harness.stored_files(), (0, 0));
    assert!(harness
        .state
        .repo
        .collections(user.id)
        .await
        .expect("Listed collections")
        .is_empty());
}

#[tokio::test]
async fn user_quota_rejects_before_storing() {
    let harness = Harness::new().await;
    let user = user(1_000_000);
    harness.store_usage(user.id, 999_000).await;

    // trailing bytes after the end of image marker are ignored by decoders
    let mut bytes = encode(16, 16, ImageFormat::Jpeg);
    assert!(bytes.len() < 2_000);
    bytes.resize(2_000, 0);

    let err = upload_batch(&harness.state, &user, vec![file("small.jpg", bytes)])
        .await
        .expect_err("Rejected");

    assert!(matches!(
        batch_error(&err),
        BatchError::UserQuota { quota: 1_000_000 }
    ));
    assert!(err.root_cause().to_string().contains("1000000"));
    assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(harness.stored_files(), (0, 0));

    let stats = harness
        .state
        .repo
        .user_stats(user.id)
        .await
        .expect("Read stats");
    assert_eq!(stats.photo_count, 1);
    assert_eq!(stats.used_space, 999_000);
}

#[tokio::test]
async fn file_filling_quota_exactly_is_accepted() {
    let harness = Harness::new().await;
    let user = user(1_000_000);
    harness.store_usage(user.id, 999_000).await;

    let mut bytes = encode(8, 8, ImageFormat::Jpeg);
    assert!(bytes.len() < 1_000);
    bytes.resize(1_000, 0);

    let collection = upload_batch(&harness.state, &user, vec![file("exact.jpg", bytes)])
        .await
        .expect("Uploaded");

    let photo = harness.photo(collection.photo_ids[0]).await;
    assert!(photo.used_space > 1_000, "row records the thumbnail too");

    let stats = harness
        .state
        .repo
        .user_stats(user.id)
        .await
        .expect("Read stats");
    assert_eq!(stats.used_space, 999_000 + photo.used_space);
    assert_eq!(harness.stored_files(), (1, 1));
}

#[tokio::test]
async fn global_quota_rejects_batch() {
    let harness = Harness::with_config(|config| config.quota.global = 100).await;
    let user = user(0);

    let err = upload_batch(
        &harness.state,
        &user,
        vec![file("a.png", encode(32, 32, ImageFormat::Png))],
    )
    .await
    .expect_err("Rejected");

    assert!(matches!(batch_error(&err), BatchError::GlobalQuota));
    assert_eq!(harness.stored_files(), (0, 0));
}

#[tokio::test]
async fn three_files_make_one_collection() {
    let harness = Harness::new().await;
    let user = user(0);

    let names = ["first.jpg", "second.png", "third.jpeg"];
    let files = vec![
        file(names[0], encode(40, 30, ImageFormat::Jpeg)),
        file(names[1], encode(30, 40, ImageFormat::Png)),
        file(names[2], encode(50, 50, ImageFormat::Jpeg)),
    ];

    let collection = upload_batch(&harness.state, &user, files)
        .await
        .expect("Uploaded");

    assert_eq!(collection.owner, user.id);
    assert_eq!(collection.photo_ids.len(), 3);
    assert_eq!(
        collection.photo_ids.iter().collect::<BTreeSet<_>>().len(),
        3
    );
    assert_eq!(
        collection.name,
        collection_name(OffsetDateTime::now_utc().date())
    );

    for (id, name) in collection.photo_ids.iter().zip(names) {
        assert_eq!(harness.photo(*id).await.descriptor.filename, name);
    }

    let collections = harness
        .state
        .repo
        .collections(user.id)
        .await
        .expect("Listed collections");
    assert_eq!(collections, vec![collection]);

    assert_eq!(harness.stored_files(), (3, 3));
}

#[tokio::test]
async fn corrupt_file_rolls_back_batch() {
    let harness = Harness::with_config(|config| config.media.upload_concurrency = 1).await;
    let user = user(0);

    let files = vec![
        file("good.jpg", encode(40, 30, ImageFormat::Jpeg)),
        file("broken.jpg", b"this is not a jpeg".to_vec()),
        file("also-good.png", encode(30, 40, ImageFormat::Png)),
    ];

    let err = upload_batch(&harness.state, &user, files)
        .await
        .expect_err("Rejected");

    assert!(matches!(batch_error(&err), BatchError::CorruptFile));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert!(!err.root_cause().to_string().contains("broken.jpg"));

    let stats = harness
        .state
        .repo
        .user_stats(user.id)
        .await
        .expect("Read stats");
    assert_eq!(stats.photo_count, 0);
    assert!(harness
        .state
        .repo
        .collections(user.id)
        .await
        .expect("Listed collections")
        .is_empty());
    assert_eq!(harness.stored_files(), (0, 0));
}

#[tokio::test]
async fn first_failing_file_decides_the_error() {
    let harness = Harness::new().await;
    let user = user(0);

    let files = vec![
        file("broken.png", b"garbage".to_vec()),
        file("notes.xyz", b"garbage".to_vec()),
    ];

    let err = upload_batch(&harness.state, &user, files)
        .await
        .expect_err("Rejected");

    assert!(matches!(batch_error(&err), BatchError::CorruptFile));
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let harness = Harness::new().await;

    let err = upload_batch(&harness.state, &user(0), Vec::new())
        .await
        .expect_err("Rejected");

    assert!(matches!(err.kind(), Some(UploadError::NoFiles)));
}

#[tokio::test]
async fn failed_thumbnail_is_captured() {
    let harness = Harness::new().await;
    let user = user(0);

    let png = encode(64, 64, ImageFormat::Png);
    let truncated = png[..png.len() / 2].to_vec();

    let err = upload_batch(&harness.state, &user, vec![file("cut.png", truncated.clone())])
        .await
        .expect_err("Rejected");
    assert!(matches!(batch_error(&err), BatchError::CorruptFile));

    let diagnostics = harness.root.path().join("diagnostics");

    let mut captured = Vec::new();
    for _ in 0..50 {
        if let Ok(entries) = std::fs::read_dir(&diagnostics) {
            captured = entries.filter_map(Result::ok).map(|e| e.path()).collect();
            let written = captured
                .first()
                .and_then(|path| std::fs::read(path).ok())
                .is_some_and(|bytes| bytes == truncated);

            if written {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(captured.len(), 1);
    assert_eq!(
        captured[0].extension().and_then(|e| e.to_str()),
        Some("png")
    );
    assert_eq!(std::fs::read(&captured[0]).expect("Read capture"), truncated);
}

#[test]
fn collection_names_are_dates() {
    let date = time::macros::date!(2024 - 03 - 07);

    assert_eq!(collection_name(date), "2024-03-07");
}
