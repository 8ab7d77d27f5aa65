//! A small graph dataset for trying Sift without a real warehouse.
//!
//! Loaded into an empty warehouse when no init script is configured.

/// Node and relationship tables; idempotent.
pub const DEMO_SCRIPT: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    node_id  INTEGER PRIMARY KEY,
    name     TEXT NOT NULL,
    kind     TEXT NOT NULL    -- 'station' | 'depot'
);

CREATE TABLE IF NOT EXISTS relationships (
    source_node_id INTEGER NOT NULL REFERENCES nodes(node_id),
    target_node_id INTEGER NOT NULL REFERENCES nodes(node_id),
    weight         REAL    NOT NULL DEFAULT 1.0,
    PRIMARY KEY (source_node_id, target_node_id)
);

INSERT OR IGNORE INTO nodes (node_id, name, kind) VALUES
    (1, 'Harbor',    'depot'),
    (2, 'Mill Road', 'station'),
    (3, 'Old Town',  'station'),
    (4, 'Riverside', 'station'),
    (5, 'Airport',   'depot');

INSERT OR IGNORE INTO relationships (source_node_id, target_node_id, weight) VALUES
    (1, 2, 4.0),
    (2, 3, 2.5),
    (3, 4, 1.0),
    (4, 1, 3.0),
    (2, 5, 9.5),
    (5, 3, 7.0);
";
