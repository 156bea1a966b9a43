//! Fleet store: persisted identities, vehicles and grants
//!
//! SQLite-backed. All row mutations go through one connection behind a
//! mutex; idempotent inserts use `INSERT OR IGNORE` against the unique
//! constraints so concurrent callers converge on one row.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rcfleet_core::{
    AccessLevel, Calibration, FleetError, Grant, Identity, IdentityId, Result, Role, Vehicle,
    VehicleId,
};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

/// Persistence operations the access registry relies on
pub trait FleetStore: Send + Sync {
    /// Create an identity
    ///
    /// With `role = None` the first identity in an empty store becomes an
    /// administrator and later ones operators. Fails with `IdentityExists`
    /// when the name is taken.
    fn create_identity(&self, name: &str, role: Option<Role>) -> Result<Identity>;

    fn identity(&self, id: IdentityId) -> Result<Option<Identity>>;

    /// All identities, oldest first
    fn identities(&self) -> Result<Vec<Identity>>;

    /// Returns false when the identity does not exist
    fn set_role(&self, id: IdentityId, role: Role) -> Result<bool>;

    /// Delete an identity and, by cascade, its grants
    fn delete_identity(&self, id: IdentityId) -> Result<bool>;

    fn vehicle_by_name(&self, name: &str) -> Result<Option<Vehicle>>;

    /// Insert a vehicle unless one with that name exists, then read it back
    fn insert_vehicle_if_absent(&self, name: &str, calibration: &Calibration) -> Result<Vehicle>;

    /// All vehicles ordered by name
    fn vehicles(&self) -> Result<Vec<Vehicle>>;

    /// Insert a grant unless the pair already exists; true when inserted
    fn insert_grant_if_absent(&self, grant: &Grant) -> Result<bool>;

    /// Atomically replace every grant of the identity with `grant`
    fn replace_grants(&self, grant: &Grant) -> Result<()>;

    /// Returns false when no such grant existed
    fn delete_grant(&self, identity: IdentityId, vehicle: VehicleId) -> Result<bool>;

    fn grant_exists(&self, identity: IdentityId, vehicle: VehicleId) -> Result<bool>;

    /// Vehicles the identity holds a grant for, ordered by name
    fn vehicles_for(&self, identity: IdentityId) -> Result<Vec<Vehicle>>;

    /// Every grant in the store
    fn grants(&self) -> Result<Vec<Grant>>;
}

fn storage(err: rusqlite::Error) -> FleetError {
    FleetError::Storage(err.to_string())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn parse_column<T: std::str::FromStr>(idx: usize, value: String) -> rusqlite::Result<T> {
    value.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unexpected value {:?}", value).into(),
        )
    })
}

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: IdentityId(row.get(0)?),
        name: row.get(1)?,
        role: parse_column(2, row.get(2)?)?,
    })
}

fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: VehicleId(row.get(0)?),
        name: row.get(1)?,
        calibration: Calibration {
            servo_pin: row.get(2)?,
            servo_center_deg: row.get(3)?,
            servo_deflection_deg: row.get(4)?,
            motor_max_pwm: row.get(5)?,
        },
    })
}

const VEHICLE_COLUMNS: &str =
    "v.id, v.name, v.servo_pin, v.servo_center_deg, v.servo_deflection_deg, v.motor_max_pwm";

/// SQLite implementation of [`FleetStore`]
pub struct SqliteFleetStore {
    db: Mutex<Connection>,
}

impl SqliteFleetStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS identities (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL DEFAULT 'operator'
        );

        CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            servo_pin INTEGER NOT NULL,
            servo_center_deg INTEGER NOT NULL,
            servo_deflection_deg INTEGER NOT NULL,
            motor_max_pwm INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS grants (
            identity_id INTEGER NOT NULL,
            vehicle_id INTEGER NOT NULL,
            access_level TEXT NOT NULL DEFAULT 'driver',
            PRIMARY KEY (identity_id, vehicle_id),
            FOREIGN KEY (identity_id) REFERENCES identities(id) ON DELETE CASCADE,
            FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_grants_vehicle
        ON grants(vehicle_id);
    ";

    /// Open or create the fleet database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening fleet database: {}", path.display());
        let db = Connection::open(path).map_err(|e| {
            FleetError::Storage(format!(
                "Failed to open fleet database at {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::initialize(db)
    }

    /// Open an in-memory fleet database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().map_err(storage)?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self> {
        db.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
            .map_err(storage)?;
        db.execute_batch(Self::SCHEMA).map_err(storage)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| FleetError::Storage("Fleet database lock poisoned".to_string()))
    }

    fn identity_exists(db: &Connection, id: IdentityId) -> Result<bool> {
        db.query_row(
            "SELECT EXISTS(SELECT 1 FROM identities WHERE id = ?1)",
            params![id.0],
            |row| row.get(0),
        )
        .map_err(storage)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql).map_err(storage)
    }
}

impl FleetStore for SqliteFleetStore {
    fn create_identity(&self, name: &str, role: Option<Role>) -> Result<Identity> {
        let mut db = self.conn()?;
        let tx = db.transaction().map_err(storage)?;

        let role = match role {
            Some(role) => role,
            None => {
                let count: i64 = tx
                    .query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))
                    .map_err(storage)?;
                if count == 0 {
                    Role::Administrator
                } else {
                    Role::Operator
                }
            }
        };

        tx.execute(
            "INSERT INTO identities (name, role) VALUES (?1, ?2)",
            params![name, role.as_str()],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                FleetError::IdentityExists(name.to_string())
            } else {
                storage(e)
            }
        })?;
        let id = IdentityId(tx.last_insert_rowid());
        tx.commit().map_err(storage)?;

        debug!("Created identity {} ({}) as {}", id, name, role.as_str());
        Ok(Identity {
            id,
            name: name.to_string(),
            role,
        })
    }

    fn identity(&self, id: IdentityId) -> Result<Option<Identity>> {
        self.conn()?
            .query_row(
                "SELECT id, name, role FROM identities WHERE id = ?1",
                params![id.0],
                identity_from_row,
            )
            .optional()
            .map_err(storage)
    }

    fn identities(&self) -> Result<Vec<Identity>> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare("SELECT id, name, role FROM identities ORDER BY id")
            .map_err(storage)?;
        let rows = stmt.query_map([], identity_from_row).map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }

    fn set_role(&self, id: IdentityId, role: Role) -> Result<bool> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE identities SET role = ?1 WHERE id = ?2",
                params![role.as_str(), id.0],
            )
            .map_err(storage)?;
        Ok(changed > 0)
    }

    fn delete_identity(&self, id: IdentityId) -> Result<bool> {
        let changed = self
            .conn()?
            .execute("DELETE FROM identities WHERE id = ?1", params![id.0])
            .map_err(storage)?;
        Ok(changed > 0)
    }

    fn vehicle_by_name(&self, name: &str) -> Result<Option<Vehicle>> {
        self.conn()?
            .query_row(
                &format!("SELECT {} FROM vehicles v WHERE v.name = ?1", VEHICLE_COLUMNS),
                params![name],
                vehicle_from_row,
            )
            .optional()
            .map_err(storage)
    }

    fn insert_vehicle_if_absent(&self, name: &str, calibration: &Calibration) -> Result<Vehicle> {
        let db = self.conn()?;
        let inserted = db
            .execute(
                "INSERT OR IGNORE INTO vehicles
                    (name, servo_pin, servo_center_deg, servo_deflection_deg, motor_max_pwm)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    calibration.servo_pin,
                    calibration.servo_center_deg,
                    calibration.servo_deflection_deg,
                    calibration.motor_max_pwm
                ],
            )
            .map_err(storage)?;
        if inserted > 0 {
            info!("Created vehicle '{}'", name);
        }

        db.query_row(
            &format!("SELECT {} FROM vehicles v WHERE v.name = ?1", VEHICLE_COLUMNS),
            params![name],
            vehicle_from_row,
        )
        .map_err(storage)
    }

    fn vehicles(&self) -> Result<Vec<Vehicle>> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare(&format!(
                "SELECT {} FROM vehicles v ORDER BY v.name",
                VEHICLE_COLUMNS
            ))
            .map_err(storage)?;
        let rows = stmt.query_map([], vehicle_from_row).map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }

    fn insert_grant_if_absent(&self, grant: &Grant) -> Result<bool> {
        let db = self.conn()?;
        if !Self::identity_exists(&db, grant.identity_id)? {
            return Err(FleetError::UnknownIdentity(grant.identity_id));
        }

        let inserted = db
            .execute(
                "INSERT OR IGNORE INTO grants (identity_id, vehicle_id, access_level)
                 VALUES (?1, ?2, ?3)",
                params![
                    grant.identity_id.0,
                    grant.vehicle_id.0,
                    grant.access_level.as_str()
                ],
            )
            .map_err(storage)?;
        Ok(inserted > 0)
    }

    fn replace_grants(&self, grant: &Grant) -> Result<()> {
        let mut db = self.conn()?;
        if !Self::identity_exists(&db, grant.identity_id)? {
            return Err(FleetError::UnknownIdentity(grant.identity_id));
        }

        let tx = db.transaction().map_err(storage)?;
        tx.execute(
            "DELETE FROM grants WHERE identity_id = ?1 AND vehicle_id != ?2",
            params![grant.identity_id.0, grant.vehicle_id.0],
        )
        .map_err(storage)?;
        tx.execute(
            "INSERT OR IGNORE INTO grants (identity_id, vehicle_id, access_level)
             VALUES (?1, ?2, ?3)",
            params![
                grant.identity_id.0,
                grant.vehicle_id.0,
                grant.access_level.as_str()
            ],
        )
        .map_err(storage)?;
        tx.commit().map_err(storage)
    }

    fn delete_grant(&self, identity: IdentityId, vehicle: VehicleId) -> Result<bool> {
        let changed = self
            .conn()?
            .execute(
                "DELETE FROM grants WHERE identity_id = ?1 AND vehicle_id = ?2",
                params![identity.0, vehicle.0],
            )
            .map_err(storage)?;
        Ok(changed > 0)
    }

    fn grant_exists(&self, identity: IdentityId, vehicle: VehicleId) -> Result<bool> {
        self.conn()?
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM grants WHERE identity_id = ?1 AND vehicle_id = ?2)",
                params![identity.0, vehicle.0],
                |row| row.get(0),
            )
            .map_err(storage)
    }

    fn vehicles_for(&self, identity: IdentityId) -> Result<Vec<Vehicle>> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare(&format!(
                "SELECT {} FROM vehicles v
                 JOIN grants g ON g.vehicle_id = v.id
                 WHERE g.identity_id = ?1
                 ORDER BY v.name",
                VEHICLE_COLUMNS
            ))
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![identity.0], vehicle_from_row)
            .map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }

    fn grants(&self) -> Result<Vec<Grant>> {
        let db = self.conn()?;
        let mut stmt = db
            .prepare(
                "SELECT identity_id, vehicle_id, access_level FROM grants
                 ORDER BY identity_id, vehicle_id",
            )
            .map_err(storage)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Grant {
                    identity_id: IdentityId(row.get(0)?),
                    vehicle_id: VehicleId(row.get(1)?),
                    access_level: parse_column::<AccessLevel>(2, row.get(2)?)?,
                })
            })
            .map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteFleetStore {
        SqliteFleetStore::open_in_memory().unwrap()
    }

    fn driver(identity: IdentityId, vehicle: VehicleId) -> Grant {
        Grant {
            identity_id: identity,
            vehicle_id: vehicle,
            access_level: AccessLevel::Driver,
        }
    }

    #[test]
    fn test_first_identity_is_administrator() {
        let store = store();
        let first = store.create_identity("alice", None).unwrap();
        let second = store.create_identity("bob", None).unwrap();
        let explicit = store
            .create_identity("carol", Some(Role::Administrator))
            .unwrap();

        assert_eq!(first.role, Role::Administrator);
        assert_eq!(second.role, Role::Operator);
        assert_eq!(explicit.role, Role::Administrator);
        assert_eq!(store.identities().unwrap().len(), 3);
    }

    #[test]
    fn test_duplicate_identity_name() {
        let store = store();
        store.create_identity("alice", None).unwrap();
        let result = store.create_identity("alice", None);
        assert!(matches!(result, Err(FleetError::IdentityExists(name)) if name == "alice"));
    }

    #[test]
    fn test_insert_vehicle_if_absent_is_idempotent() {
        let store = store();
        let cal = Calibration::default();
        let a = store.insert_vehicle_if_absent("DefaultCar", &cal).unwrap();
        let b = store.insert_vehicle_if_absent("DefaultCar", &cal).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.calibration, cal);
        assert_eq!(store.vehicles().unwrap().len(), 1);
    }

    #[test]
    fn test_existing_vehicle_keeps_its_calibration() {
        let store = store();
        let custom = Calibration {
            servo_pin: 9,
            ..Calibration::default()
        };
        store.insert_vehicle_if_absent("Blue", &custom).unwrap();
        let again = store
            .insert_vehicle_if_absent("Blue", &Calibration::default())
            .unwrap();
        assert_eq!(again.calibration.servo_pin, 9);
    }

    #[test]
    fn test_grants_are_unique_per_pair() {
        let store = store();
        let alice = store.create_identity("alice", None).unwrap();
        let car = store
            .insert_vehicle_if_absent("DefaultCar", &Calibration::default())
            .unwrap();

        assert!(store.insert_grant_if_absent(&driver(alice.id, car.id)).unwrap());
        assert!(!store.insert_grant_if_absent(&driver(alice.id, car.id)).unwrap());
        assert_eq!(store.grants().unwrap().len(), 1);
        assert!(store.grant_exists(alice.id, car.id).unwrap());
    }

    #[test]
    fn test_grant_for_unknown_identity() {
        let store = store();
        let car = store
            .insert_vehicle_if_absent("DefaultCar", &Calibration::default())
            .unwrap();
        let result = store.insert_grant_if_absent(&driver(IdentityId(42), car.id));
        assert!(matches!(
            result,
            Err(FleetError::UnknownIdentity(IdentityId(42)))
        ));
    }

    #[test]
    fn test_vehicles_for_ordered_by_name() {
        let store = store();
        let alice = store.create_identity("alice", None).unwrap();
        for name in ["Zulu", "Alpha", "Mike"] {
            let v = store
                .insert_vehicle_if_absent(name, &Calibration::default())
                .unwrap();
            store.insert_grant_if_absent(&driver(alice.id, v.id)).unwrap();
        }
        // Vehicle without a grant is not listed
        store
            .insert_vehicle_if_absent("Other", &Calibration::default())
            .unwrap();

        let names: Vec<String> = store
            .vehicles_for(alice.id)
            .unwrap()
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Mike", "Zulu"]);
    }

    #[test]
    fn test_replace_grants_keeps_single_vehicle() {
        let store = store();
        let alice = store.create_identity("alice", None).unwrap();
        let a = store
            .insert_vehicle_if_absent("A", &Calibration::default())
            .unwrap();
        let b = store
            .insert_vehicle_if_absent("B", &Calibration::default())
            .unwrap();

        store.replace_grants(&driver(alice.id, a.id)).unwrap();
        store.replace_grants(&driver(alice.id, b.id)).unwrap();

        let vehicles = store.vehicles_for(alice.id).unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].id, b.id);
    }

    #[test]
    fn test_delete_identity_cascades_grants() {
        let store = store();
        let alice = store.create_identity("alice", None).unwrap();
        let car = store
            .insert_vehicle_if_absent("DefaultCar", &Calibration::default())
            .unwrap();
        store.insert_grant_if_absent(&driver(alice.id, car.id)).unwrap();

        assert!(store.delete_identity(alice.id).unwrap());
        assert!(!store.delete_identity(alice.id).unwrap());
        assert!(store.grants().unwrap().is_empty());
        // The vehicle itself stays
        assert!(store.vehicle_by_name("DefaultCar").unwrap().is_some());
    }

    #[test]
    fn test_set_role_and_delete_grant() {
        let store = store();
        let alice = store.create_identity("alice", None).unwrap();
        let bob = store.create_identity("bob", None).unwrap();

        assert!(store.set_role(bob.id, Role::Administrator).unwrap());
        assert_eq!(
            store.identity(bob.id).unwrap().unwrap().role,
            Role::Administrator
        );
        assert!(!store.set_role(IdentityId(99), Role::Operator).unwrap());

        let car = store
            .insert_vehicle_if_absent("DefaultCar", &Calibration::default())
            .unwrap();
        store.insert_grant_if_absent(&driver(alice.id, car.id)).unwrap();
        assert!(store.delete_grant(alice.id, car.id).unwrap());
        assert!(!store.delete_grant(alice.id, car.id).unwrap());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("fleet.db");

        {
            let store = SqliteFleetStore::open(&path).unwrap();
            store.create_identity("alice", None).unwrap();
        }

        let store = SqliteFleetStore::open(&path).unwrap();
        let identities = store.identities().unwrap();
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].name, "alice");
    }
}
