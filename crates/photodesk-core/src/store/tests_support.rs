//! Shared fixtures and a behavioural check run against every store.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use super::PhotoStore;
use crate::error::StoreError;
use crate::types::{
    Asset, AssetKind, DerivedFields, ExifData, Histogram, LocationFields, Orientation, Photo,
    PhotoRendition, PhotoStatus, Variant, Visibility,
};

pub(crate) fn sample_rows(captured_at: Option<NaiveDateTime>) -> (Asset, Photo) {
    let now = Utc::now();
    let storage_id = Uuid::new_v4();
    let asset = Asset {
        id: Uuid::new_v4(),
        kind: AssetKind::Image,
        url: format!("memory://blobs/photos/{storage_id}/original.jpg"),
        width: 4000,
        height: 3000,
        byte_size: 1_234_567,
        checksum: format!("{:064x}", storage_id.as_u128()),
        created_at: now,
        updated_at: now,
        created_by: Some("operator".to_string()),
    };
    let photo = Photo {
        id: Uuid::new_v4(),
        title: Some("Harbour".to_string()),
        description: None,
        captured_at,
        uploaded_at: now,
        asset_id: asset.id,
        storage_id,
        width: 4000,
        height: 3000,
        aspect_ratio: 4000.0 / 3000.0,
        orientation: Orientation::Landscape,
        megapixels: 12.0,
        place: None,
        city: None,
        region: None,
        country: None,
        latitude: None,
        longitude: None,
        dominant_color: None,
        blurhash: None,
        dynamic_range_usage: None,
        is_visible: false,
        status: PhotoStatus::Draft,
        visibility: Visibility::Private,
        created_at: now,
        updated_at: now,
        created_by: Some("operator".to_string()),
    };
    (asset, photo)
}

pub(crate) fn rendition(photo: &Photo, variant: Variant) -> PhotoRendition {
    let now = Utc::now();
    PhotoRendition {
        id: Uuid::new_v4(),
        photo_id: photo.id,
        variant,
        url: format!(
            "memory://blobs/photos/{}/{}.jpg",
            photo.storage_id,
            variant.as_str()
        ),
        width: 320,
        height: 240,
        byte_size: 2048,
        checksum: "ab".repeat(32),
        created_at: now,
        updated_at: now,
    }
}

fn histogram() -> Histogram {
    let mut luma = vec![0u32; 256];
    luma[0] = 12;
    Histogram {
        luma: luma.clone(),
        red: luma.clone(),
        green: luma.clone(),
        blue: luma,
        highlights_pct: 0.0,
        shadows_pct: 100.0,
    }
}

fn date(y: i32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(y, 5, 17).and_then(|d| d.and_hms_opt(9, 30, 0))
}

pub(crate) async fn exercise_store(store: &dyn PhotoStore) {
    let (asset, photo) = sample_rows(date(2021));
    store.insert_asset(&asset).await.unwrap();
    store.insert_photo(&photo).await.unwrap();

    // Checksum lookup
    let found = store
        .find_asset_by_checksum(&asset.checksum)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, asset.id);
    assert!(store
        .find_asset_by_checksum("missing")
        .await
        .unwrap()
        .is_none());

    // Baseline record is an invisible draft
    let record = store.get_photo(photo.id).await.unwrap().unwrap();
    assert_eq!(record.photo.status, PhotoStatus::Draft);
    assert!(!record.photo.is_visible);
    assert_eq!(record.asset.id, asset.id);
    assert!(record.renditions.is_empty());
    assert!(record.exif.is_none());

    let exif = ExifData {
        camera_make: Some("Leica".to_string()),
        iso: Some(200),
        captured_at: date(2021),
        ..Default::default()
    };
    store.insert_exif(photo.id, &exif).await.unwrap();

    // One row per variant
    for variant in Variant::ALL {
        store
            .insert_rendition(&rendition(&photo, variant))
            .await
            .unwrap();
    }
    let dup = store.insert_rendition(&rendition(&photo, Variant::List)).await;
    assert!(matches!(dup, Err(StoreError::Conflict(_))));

    store.insert_histogram(photo.id, &histogram()).await.unwrap();
    let dup = store.insert_histogram(photo.id, &histogram()).await;
    assert!(matches!(dup, Err(StoreError::Conflict(_))));

    // Publishing
    let derived = DerivedFields {
        dominant_color: "#102030".to_string(),
        blurhash: "L00000fQfQfQfQfQfQfQfQfQfQfQ".to_string(),
        dynamic_range_usage: 0.0,
    };
    store.finalize_photo(photo.id, &derived).await.unwrap();
    assert!(store
        .finalize_photo(Uuid::new_v4(), &derived)
        .await
        .is_err());

    let record = store.get_photo(photo.id).await.unwrap().unwrap();
    assert_eq!(record.photo.status, PhotoStatus::Published);
    assert_eq!(record.photo.visibility, Visibility::Public);
    assert!(record.photo.is_visible);
    assert_eq!(record.photo.dominant_color.as_deref(), Some("#102030"));
    assert_eq!(record.exif.as_ref(), Some(&exif));
    assert_eq!(
        record.renditions.iter().map(|r| r.variant).collect::<Vec<_>>(),
        Variant::ALL.to_vec()
    );
    assert_eq!(record.histogram.as_ref().unwrap().luma[0], 12);

    // Location fill never overwrites
    store
        .fill_location(
            photo.id,
            &LocationFields {
                city: Some("Porto".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let written = store
        .fill_location(
            photo.id,
            &LocationFields {
                place: Some("Ribeira".to_string()),
                city: Some("Lisbon".to_string()),
                region: Some("Norte".to_string()),
                country: Some("Portugal".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(written.city, None);
    assert_eq!(written.country.as_deref(), Some("Portugal"));
    let loc = store.location(photo.id).await.unwrap().unwrap();
    assert_eq!(loc.city.as_deref(), Some("Porto"));
    assert!(loc.is_complete());
    assert!(store.location(Uuid::new_v4()).await.unwrap().is_none());

    // Years and listing
    let (asset2, mut photo2) = sample_rows(date(2023));
    photo2.uploaded_at = photo.uploaded_at + chrono::Duration::seconds(5);
    store.insert_asset(&asset2).await.unwrap();
    store.insert_photo(&photo2).await.unwrap();
    let (asset3, photo3) = sample_rows(None);
    store.insert_asset(&asset3).await.unwrap();
    store.insert_photo(&photo3).await.unwrap();
    assert_eq!(store.distinct_years().await.unwrap(), vec![2023, 2021]);
    let listed = store.list_photos().await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].id, photo2.id);

    // Reprocess-style replacement
    assert_eq!(store.delete_renditions(photo.id).await.unwrap(), 3);
    store.delete_histogram(photo.id).await.unwrap();
    let record = store.get_photo(photo.id).await.unwrap().unwrap();
    assert!(record.renditions.is_empty());
    assert!(record.histogram.is_none());
    assert!(record.exif.is_some());

    // Cascade delete
    store
        .insert_rendition(&rendition(&photo, Variant::Thumb))
        .await
        .unwrap();
    store.delete_photo(photo.id).await.unwrap();
    store.delete_asset(asset.id).await.unwrap();
    assert!(store.get_photo(photo.id).await.unwrap().is_none());
    assert!(store
        .find_asset_by_checksum(&asset.checksum)
        .await
        .unwrap()
        .is_none());
}
