use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::{
    metadata::Metadata,
    repo::{
        Collection, CollectionId, CollectionRepo, Descriptor, FullRepo, Photo, PhotoId,
        PhotoRepo, PhotoUpdate, RepoError, Role, Stats, User, UserId, UserRepo,
    },
};

use super::{decode_stats, encode_stats, SledRepo};

fn repo() -> SledRepo {
    let db = sled::Config::new()
        .temporary(true)
        .open()
        .expect("Opened temporary db");

    SledRepo::new(db).expect("Opened trees")
}

fn photo(owner: UserId, used_space: u64, favorite: bool) -> Photo {
    let now = OffsetDateTime::now_utc();

    Photo {
        id: PhotoId::generate(),
        owner,
        descriptor: Descriptor {
            filename: String::from("photo.jpg"),
            uploaded_at: now,
            format: String::from("jpg"),
            tags: BTreeSet::new(),
            favorite,
            metadata: Metadata::empty(now),
        },
        used_space,
        content_hash: String::from("00"),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

#[tokio::test]
async fn health_check() {
    repo().health_check().await.expect("Healthy");
}

#[tokio::test]
async fn create_and_read_photo() {
    let repo = repo();
    let photo = photo(UserId::generate(), 10, false);

    let id = repo.create_photo(&photo).await.expect("Created photo");
    assert_eq!(id, photo.id);

    let stored = repo.photo(id).await.expect("Read photo");
    assert_eq!(stored, Some(photo));
}

#[tokio::test]
async fn duplicate_photo_is_rejected() {
    let repo = repo();
    let photo = photo(UserId::generate(), 10, false);

    repo.create_photo(&photo).await.expect("Created photo");

    let res = repo.create_photo(&photo).await;
    assert!(matches!(res, Err(RepoError::AlreadyExists)));
}

#[tokio::test]
async fn stats_are_aggregated_per_user() {
    let repo = repo();
    let alice = UserId::generate();
    let bob = UserId::generate();

    for p in [
        photo(alice, 100, true),
        photo(alice, 250, false),
        photo(bob, 1000, true),
    ] {
        repo.create_photo(&p).await.expect("Created photo");
    }

    let alice_stats = repo.user_stats(alice).await.expect("Alice stats");
    assert_eq!(
        alice_stats,
        Stats {
            photo_count: 2,
            favorite_count: 1,
            used_space: 350,
        }
    );

    let stats = repo.stats().await.expect("Global stats");
    assert_eq!(
        stats,
        Stats {
            photo_count: 3,
            favorite_count: 2,
            used_space: 1350,
        }
    );

    let nobody = repo.user_stats(UserId::generate()).await.expect("Stats");
    assert_eq!(nobody, Stats::default());
}

#[tokio::test]
async fn soft_deleted_photos_are_excluded_from_stats() {
    let repo = repo();
    let owner = UserId::generate();
    let kept = photo(owner, 100, false);
    let deleted = photo(owner, 400, true);

    repo.create_photo(&kept).await.expect("Created photo");
    repo.create_photo(&deleted).await.expect("Created photo");

    let before = repo
        .soft_delete_photo(deleted.id)
        .await
        .expect("Soft deleted");
    assert_eq!(before.map(|p| p.id), Some(deleted.id));

    let again = repo
        .soft_delete_photo(deleted.id)
        .await
        .expect("Soft deleted");
    assert!(again.is_none());

    let stored = repo
        .photo(deleted.id)
        .await
        .expect("Read photo")
        .expect("Row still present");
    assert!(stored.is_deleted());

    let stats = repo.user_stats(owner).await.expect("Stats");
    assert_eq!(stats.photo_count, 1);
    assert_eq!(stats.used_space, 100);
    assert_eq!(stats.favorite_count, 0);
}

#[tokio::test]
async fn update_photo_tags_and_favorite() {
    let repo = repo();
    let photo = photo(UserId::generate(), 10, false);
    repo.create_photo(&photo).await.expect("Created photo");

    let update = PhotoUpdate {
        tags: Some(BTreeSet::from([
            String::from(" holiday "),
            String::from(""),
            String::from("beach"),
        ])),
        favorite: Some(true),
    };

    let updated = repo
        .update_photo(photo.id, update)
        .await
        .expect("Updated")
        .expect("Photo exists");

    assert!(updated.descriptor.favorite);
    assert_eq!(
        updated.descriptor.tags,
        BTreeSet::from([String::from("beach"), String::from("holiday")])
    );
    assert_eq!(updated.used_space, 10);

    let missing = repo
        .update_photo(PhotoId::generate(), PhotoUpdate::default())
        .await
        .expect("Updated");
    assert!(missing.is_none());
}

#[tokio::test]
async fn remove_photo_clears_usage() {
    let repo = repo();
    let owner = UserId::generate();
    let photo = photo(owner, 10, false);
    repo.create_photo(&photo).await.expect("Created photo");

    repo.remove_photo(photo.id).await.expect("Removed");
    repo.remove_photo(photo.id).await.expect("Removing twice is fine");

    assert!(repo.photo(photo.id).await.expect("Read").is_none());
    assert_eq!(
        repo.user_stats(owner).await.expect("Stats"),
        Stats::default()
    );
}

#[tokio::test]
async fn usage_counters_follow_every_change() {
    let repo = repo();
    let owner = UserId::generate();
    let other = UserId::generate();

    let kept = photo(owner, 100, false);
    let deleted = photo(owner, 400, true);
    let rolled_back = photo(owner, 50, false);
    let foreign = photo(other, 1000, false);

    for p in [&kept, &deleted, &rolled_back, &foreign] {
        repo.create_photo(p).await.expect("Created photo");
    }

    repo.update_photo(
        kept.id,
        PhotoUpdate {
            tags: None,
            favorite: Some(true),
        },
    )
    .await
    .expect("Updated");

    repo.soft_delete_photo(deleted.id)
        .await
        .expect("Soft deleted");
    repo.remove_photo(rolled_back.id).await.expect("Removed");

    let expected = Stats {
        photo_count: 1,
        favorite_count: 1,
        used_space: 100,
    };
    assert_eq!(repo.user_stats(owner).await.expect("Stats"), expected);
    assert_eq!(
        repo.stats().await.expect("Global stats"),
        Stats {
            photo_count: 2,
            favorite_count: 1,
            used_space: 1100,
        }
    );

    // the soft deleted row was already subtracted
    repo.remove_photo(deleted.id).await.expect("Removed");
    assert_eq!(repo.user_stats(owner).await.expect("Stats"), expected);
    assert_eq!(
        repo.stats().await.expect("Global stats").used_space,
        1100
    );
}

#[test]
fn usage_records() {
    let stats = Stats {
        photo_count: 3,
        favorite_count: 1,
        used_space: u64::MAX,
    };

    assert_eq!(
        decode_stats(&encode_stats(&stats)).expect("Decoded"),
        stats
    );
    assert!(decode_stats(&[0; 8]).is_err());
}

#[tokio::test]
async fn users_are_upserted() {
    let repo = repo();
    let mut user = User {
        id: UserId::generate(),
        name: String::from("alice"),
        role: Role {
            name: String::from("member"),
            quota: 1_000_000,
        },
    };

    repo.upsert_user(&user).await.expect("Inserted");
    user.role.quota = 0;
    repo.upsert_user(&user).await.expect("Updated");

    let stored = repo.user(user.id).await.expect("Read user");
    assert_eq!(stored, Some(user));
    assert!(repo
        .user(UserId::generate())
        .await
        .expect("Read user")
        .is_none());
}

#[tokio::test]
async fn collections_are_listed_per_owner() {
    let repo = repo();
    let owner = UserId::generate();

    let collection = Collection {
        id: CollectionId::generate(),
        owner,
        name: String::from("2024-05-01"),
        photo_ids: vec![PhotoId::generate(), PhotoId::generate()],
        created_at: OffsetDateTime::now_utc(),
    };

    repo.create_collection(&collection)
        .await
        .expect("Created collection");

    assert_eq!(
        repo.collection(collection.id).await.expect("Read"),
        Some(collection.clone())
    );
    assert_eq!(
        repo.collections(owner).await.expect("Listed"),
        vec![collection]
    );
    assert!(repo
        .collections(UserId::generate())
        .await
        .expect("Listed")
        .is_empty());
}
