//! SQL DDL for initializing the tracker database.
//! SQLite-first design. Statements are split on `;` before execution, so
//! none of them (comments included) may contain one.

/// Timestamps are RFC3339 TEXT, times `HH:MM:SS` TEXT, enums snake_case TEXT.
/// Partial unique indexes on `bus_assignments` keep at most one active
/// assignment per driver, per bus and per route.
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    full_name TEXT NOT NULL DEFAULT '',
    email TEXT NULL,
    phone TEXT NULL,
    role TEXT NOT NULL DEFAULT 'student',
    university_id TEXT NULL,
    employee_id TEXT NULL,
    approval_status TEXT NOT NULL DEFAULT 'pending',
    approved_by INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    approved_at TEXT NULL,
    rejection_reason TEXT NULL,
    is_active INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
CREATE INDEX IF NOT EXISTS idx_users_approval ON users(approval_status);

CREATE TABLE IF NOT EXISTS driver_profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    license_number TEXT NOT NULL,
    license_expiry TEXT NULL,
    emergency_contact TEXT NULL,
    years_experience INTEGER NOT NULL DEFAULT 0,
    is_available INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS routes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    route_type TEXT NOT NULL DEFAULT 'shuttle',
    color TEXT NOT NULL DEFAULT '#ffc107',
    is_active INTEGER NOT NULL DEFAULT 1,
    is_published INTEGER NOT NULL DEFAULT 0,
    total_distance_km REAL NULL,
    estimated_duration_mins INTEGER NULL,
    service_days TEXT NOT NULL DEFAULT 'sat_thu',
    custom_days TEXT NULL,
    origin_name TEXT NOT NULL DEFAULT '',
    destination_name TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS stops (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    stop_order INTEGER NOT NULL DEFAULT 0,
    scheduled_time TEXT NULL,
    average_wait_mins INTEGER NOT NULL DEFAULT 2,
    is_major_stop INTEGER NOT NULL DEFAULT 0,
    UNIQUE (route_id, stop_order)
);

CREATE TABLE IF NOT EXISTS trips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    trip_number INTEGER NOT NULL DEFAULT 1,
    trip_type TEXT NOT NULL DEFAULT 'morning',
    departure_time TEXT NOT NULL,
    arrival_time TEXT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    sort_order INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS buses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bus_number TEXT NOT NULL UNIQUE,
    license_plate TEXT NOT NULL,
    bus_type TEXT NOT NULL DEFAULT 'long',
    capacity INTEGER NOT NULL DEFAULT 50,
    model TEXT NOT NULL DEFAULT '',
    year INTEGER NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    current_route_id INTEGER NULL REFERENCES routes(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS schedules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    bus_id INTEGER NULL REFERENCES buses(id) ON DELETE CASCADE,
    driver_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    day_of_week TEXT NOT NULL,
    departure_time TEXT NOT NULL,
    arrival_time TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_schedules_route_day ON schedules(route_id, day_of_week);

CREATE TABLE IF NOT EXISTS bus_assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bus_id INTEGER NOT NULL REFERENCES buses(id) ON DELETE CASCADE,
    driver_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    shift_start TEXT NOT NULL,
    shift_end TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    started_at TEXT NULL,
    ended_at TEXT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (bus_id, date, shift_start)
);

CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_active_driver
    ON bus_assignments(driver_id) WHERE is_active = 1;
CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_active_bus
    ON bus_assignments(bus_id) WHERE is_active = 1;
CREATE UNIQUE INDEX IF NOT EXISTS uq_assignment_active_route
    ON bus_assignments(route_id) WHERE is_active = 1;

CREATE TABLE IF NOT EXISTS bus_locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bus_id INTEGER NOT NULL REFERENCES buses(id) ON DELETE CASCADE,
    driver_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    speed_kmh REAL NULL,
    heading REAL NULL,
    recorded_at TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_simulated INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_bus_locations_bus_time ON bus_locations(bus_id, recorded_at DESC);

CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    reported_by INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    bus_id INTEGER NULL REFERENCES buses(id) ON DELETE SET NULL,
    route_id INTEGER NULL REFERENCES routes(id) ON DELETE SET NULL,
    latitude REAL NULL,
    longitude REAL NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    priority TEXT NOT NULL DEFAULT 'medium',
    assigned_to INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    resolution_notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    resolved_at TEXT NULL
);

CREATE TABLE IF NOT EXISTS issue_comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    body TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'info',
    audience TEXT NOT NULL DEFAULT 'all',
    target_route_id INTEGER NULL REFERENCES routes(id) ON DELETE CASCADE,
    created_by INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    is_active INTEGER NOT NULL DEFAULT 1,
    expires_at TEXT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    notification_id INTEGER NOT NULL REFERENCES notifications(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    is_read INTEGER NOT NULL DEFAULT 0,
    read_at TEXT NULL,
    UNIQUE (notification_id, user_id)
);

CREATE TABLE IF NOT EXISTS trip_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bus_id INTEGER NOT NULL REFERENCES buses(id) ON DELETE CASCADE,
    route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    driver_id INTEGER NULL REFERENCES users(id) ON DELETE SET NULL,
    date TEXT NOT NULL,
    scheduled_departure TEXT NOT NULL,
    actual_departure TEXT NULL,
    scheduled_arrival TEXT NOT NULL,
    actual_arrival TEXT NULL,
    passenger_count INTEGER NOT NULL DEFAULT 0,
    is_completed INTEGER NOT NULL DEFAULT 0,
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    route_id INTEGER NULL REFERENCES routes(id) ON DELETE SET NULL,
    bus_id INTEGER NULL REFERENCES buses(id) ON DELETE SET NULL,
    category TEXT NOT NULL,
    rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    comment TEXT NOT NULL DEFAULT '',
    is_anonymous INTEGER NOT NULL DEFAULT 0,
    is_resolved INTEGER NOT NULL DEFAULT 0,
    admin_response TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS route_analytics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    total_trips INTEGER NOT NULL DEFAULT 0,
    on_time_trips INTEGER NOT NULL DEFAULT 0,
    delayed_trips INTEGER NOT NULL DEFAULT 0,
    total_passengers INTEGER NOT NULL DEFAULT 0,
    average_delay_mins REAL NOT NULL DEFAULT 0,
    issues_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE (route_id, date)
);
"#;
