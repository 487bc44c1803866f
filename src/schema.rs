pub const SCHEMA_VERSION: &str = "1";

pub const CREATE_SCHEMA_SQL: &str = r#"
-- Schema metadata
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per distinct scanned serial
CREATE TABLE IF NOT EXISTS serial_numbers (
    ID INTEGER PRIMARY KEY AUTOINCREMENT,
    BBUSerial TEXT NOT NULL,
    TotalCount INTEGER NOT NULL DEFAULT 0,
    FirstUsedDate TIMESTAMP,
    LastUsedDate TIMESTAMP
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_serial_numbers_serial ON serial_numbers (BBUSerial);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');
"#;

/// Upgrades a table created by the legacy scanner app, which had no meta
/// table and no uniqueness constraint on the serial.
///
/// Legacy imports could leave duplicate serials and NULL counts behind. Rows
/// without a serial are dropped, NULL counts become 0 and duplicates are
/// folded into the lowest ID before the unique index is created.
pub const UPGRADE_LEGACY_SQL: &str = r#"
BEGIN IMMEDIATE;

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

DELETE FROM serial_numbers WHERE BBUSerial IS NULL;

UPDATE serial_numbers SET TotalCount = 0 WHERE TotalCount IS NULL;

UPDATE serial_numbers
SET TotalCount = (
        SELECT SUM(d.TotalCount) FROM serial_numbers d
        WHERE d.BBUSerial = serial_numbers.BBUSerial
    ),
    FirstUsedDate = (
        SELECT MIN(d.FirstUsedDate) FROM serial_numbers d
        WHERE d.BBUSerial = serial_numbers.BBUSerial
    ),
    LastUsedDate = (
        SELECT MAX(d.LastUsedDate) FROM serial_numbers d
        WHERE d.BBUSerial = serial_numbers.BBUSerial
    )
WHERE ID IN (
    SELECT MIN(ID) FROM serial_numbers GROUP BY BBUSerial HAVING COUNT(*) > 1
);

DELETE FROM serial_numbers
WHERE ID NOT IN (SELECT MIN(ID) FROM serial_numbers GROUP BY BBUSerial);

CREATE UNIQUE INDEX IF NOT EXISTS idx_serial_numbers_serial ON serial_numbers (BBUSerial);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '1');

COMMIT;
"#;
