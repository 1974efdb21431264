pub const SCHEMA: &str = r#"
-- Assets: one row per stored binary
CREATE TABLE IF NOT EXISTS assets (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    url TEXT NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    byte_size INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    created_by TEXT
);

CREATE INDEX IF NOT EXISTS idx_assets_checksum ON assets(checksum);

-- Photos: the aggregate root
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY,
    title TEXT,
    description TEXT,
    captured_at TEXT,
    uploaded_at TEXT NOT NULL,
    asset_id TEXT NOT NULL REFERENCES assets(id),
    storage_id TEXT NOT NULL,

    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    aspect_ratio REAL NOT NULL,
    orientation TEXT NOT NULL,
    megapixels REAL NOT NULL,

    place TEXT,
    city TEXT,
    region TEXT,
    country TEXT,
    latitude REAL,
    longitude REAL,

    dominant_color TEXT,
    blurhash TEXT,
    dynamic_range_usage REAL,

    is_visible INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'draft',
    visibility TEXT NOT NULL DEFAULT 'private',

    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    created_by TEXT
);

CREATE INDEX IF NOT EXISTS idx_photos_captured_at ON photos(captured_at);
CREATE INDEX IF NOT EXISTS idx_photos_uploaded_at ON photos(uploaded_at);
CREATE INDEX IF NOT EXISTS idx_photos_status ON photos(status);

-- Renditions: at most one per (photo, variant)
CREATE TABLE IF NOT EXISTS photo_renditions (
    id TEXT PRIMARY KEY,
    photo_id TEXT NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
    variant TEXT NOT NULL,
    url TEXT NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    byte_size INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(photo_id, variant)
);

-- EXIF: zero or one per photo, stored as JSON
CREATE TABLE IF NOT EXISTS photo_exif (
    photo_id TEXT PRIMARY KEY REFERENCES photos(id) ON DELETE CASCADE,
    data TEXT NOT NULL
);

-- Histogram: zero or one per photo, buckets as JSON arrays
CREATE TABLE IF NOT EXISTS photo_histograms (
    photo_id TEXT PRIMARY KEY REFERENCES photos(id) ON DELETE CASCADE,
    luma TEXT NOT NULL,
    red TEXT NOT NULL,
    green TEXT NOT NULL,
    blue TEXT NOT NULL,
    highlights_pct REAL NOT NULL,
    shadows_pct REAL NOT NULL
);
"#;
