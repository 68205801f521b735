//! Database tests

use super::*;
use crate::filter::{ExpenseFilter, SortDirection, SortField, SortOptions};
use crate::models::*;
use crate::storage::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rusqlite::params;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn user(db: &Database, name: &str) -> User {
        db.create_user(name, "hash").unwrap()
    }

    fn expense(description: &str, amount: i64, date: DateTime<Utc>) -> NewExpense {
        NewExpense::new("TestBank", date, description, amount, "USD")
    }

    fn table_sql(db: &Database, table: &str) -> String {
        db.conn()
            .unwrap()
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
                [table],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_migrations_reach_latest_version() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 11);
        assert_eq!(Database::latest_schema_version(), 11);

        // Rerunning is a no-op
        assert_eq!(db.apply_migrations().unwrap(), 0);
        assert_eq!(db.schema_version().unwrap(), 11);
    }

    #[test]
    fn test_final_schema_shape() {
        let db = Database::in_memory().unwrap();

        let expenses = table_sql(&db, "expenses");
        assert!(expenses.contains("user_id INTEGER NOT NULL"));
        assert!(expenses.contains("UNIQUE(source, date, description, amount, user_id)"));
        assert!(expenses.contains("STRICT"));

        // SQLite quotes renamed tables in stored SQL, so ask the pragma
        let fks: Vec<(String, String, String)> = {
            let conn = db.conn().unwrap();
            let mut stmt = conn.prepare("PRAGMA foreign_key_list(expenses)").unwrap();
            let rows = stmt
                .query_map([], |row| Ok((row.get(2)?, row.get(3)?, row.get(4)?)))
                .unwrap()
                .collect::<rusqlite::Result<Vec<_>>>()
                .unwrap();
            rows
        };
        assert!(fks.contains(&(
            "categories".to_string(),
            "category_id".to_string(),
            "id".to_string()
        )));
        assert!(fks.iter().any(|(table, from, _)| table == "users" && from == "user_id"));

        let categories = table_sql(&db, "categories");
        assert!(categories.contains("UNIQUE(name, user_id)"));
        assert!(!categories.contains(" type "));

        assert!(table_sql(&db, "sessions").contains("ON DELETE CASCADE"));

        let leftovers: i64 = db
            .conn()
            .unwrap()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name IN ('expenses_new', 'expenses_temp', 'categories_new')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_migrations_record_each_step() {
        let db = Database::in_memory().unwrap();
        let versions: Vec<i64> = {
            let conn = db.conn().unwrap();
            let mut stmt = conn
                .prepare("SELECT version FROM schema_migrations ORDER BY version")
                .unwrap();
            let rows = stmt
                .query_map([], |row| row.get(0))
                .unwrap()
                .collect::<rusqlite::Result<Vec<_>>>()
                .unwrap();
            rows
        };
        assert_eq!(versions, (1..=11).collect::<Vec<i64>>());
    }

    #[test]
    fn test_legacy_database_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");

        {
            let mut conn = rusqlite::Connection::open(&path).unwrap();
            crate::db::migrations::apply_migrations_up_to(&mut conn, 2).unwrap();
            conn.execute_batch(
                "INSERT INTO categories (id, name, pattern) VALUES (1, 'Food', 'restaurant');
                 INSERT INTO expenses (source, amount, description, expense_type, date, currency, category_id)
                     VALUES ('Bank', -1000, 'restaurant', 0, 1704067200, 'EUR', 1);
                 INSERT INTO expenses (source, amount, description, expense_type, date, currency, category_id)
                     VALUES ('Bank', -500, 'unknown', 0, 1704153600, 'EUR', 0);",
            )
            .unwrap();
        }

        let db = Database::open_path(&path.to_string_lossy()).unwrap();
        assert_eq!(db.schema_version().unwrap(), 11);

        // Legacy rows belong to the seeded admin account
        let admin = db.get_user_by_username(LEGACY_USERNAME).unwrap();
        assert_eq!(admin.id, 1);

        let expenses = db.get_all_expenses(admin.id).unwrap();
        assert_eq!(expenses.len(), 2);
        let unknown = expenses.iter().find(|e| e.description == "unknown").unwrap();
        assert_eq!(unknown.category_id, None);
        let food = expenses.iter().find(|e| e.description == "restaurant").unwrap();
        assert_eq!(food.category_id, Some(1));

        let categories = db.get_categories(admin.id).unwrap();
        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Food", EXCLUDE_CATEGORY_NAME]);
        assert!(db.get_exclude_category(admin.id).is_ok());
    }

    #[test]
    fn test_category_type_inferred_from_amounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typed.db");
        let mut conn = rusqlite::Connection::open(&path).unwrap();

        crate::db::migrations::apply_migrations_up_to(&mut conn, 2).unwrap();
        conn.execute_batch(
            "INSERT INTO categories (id, name, pattern) VALUES (1, 'Food', 'restaurant');
             INSERT INTO categories (id, name, pattern) VALUES (2, 'Salary', 'payroll');
             INSERT INTO categories (id, name, pattern) VALUES (3, 'Empty', 'nothing');
             INSERT INTO expenses (source, amount, description, expense_type, date, currency, category_id)
                 VALUES ('Bank', -1000, 'restaurant', 0, 1704067200, 'EUR', 1);
             INSERT INTO expenses (source, amount, description, expense_type, date, currency, category_id)
                 VALUES ('Bank', 300, 'restaurant refund', 1, 1704153600, 'EUR', 1);
             INSERT INTO expenses (source, amount, description, expense_type, date, currency, category_id)
                 VALUES ('Bank', 250000, 'payroll', 1, 1704240000, 'EUR', 2);",
        )
        .unwrap();

        crate::db::migrations::apply_migrations_up_to(&mut conn, 5).unwrap();
        assert_eq!(crate::db::migrations::current_version(&conn).unwrap(), 5);

        let category_type = |id: i64| -> i64 {
            conn.query_row("SELECT type FROM categories WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .unwrap()
        };
        assert_eq!(category_type(1), 0);
        assert_eq!(category_type(2), 1);
        assert_eq!(category_type(3), 0);
    }

    #[test]
    fn test_failed_rebuild_rolls_back_and_halts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.db");
        let mut conn = rusqlite::Connection::open(&path).unwrap();

        crate::db::migrations::apply_migrations_up_to(&mut conn, 3).unwrap();
        conn.execute(
            "INSERT INTO expenses (source, amount, description, expense_type, date, currency, category_id)
             VALUES ('Bank', -1, 'orphan', 0, 0, 'EUR', 99)",
            [],
        )
        .unwrap();

        let err = crate::db::migrations::apply_migrations(&mut conn).unwrap_err();
        assert!(matches!(err, Error::Migration { version: 4, .. }));
        assert_eq!(crate::db::migrations::current_version(&conn).unwrap(), 3);

        // The original table survived the rollback
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        let leftover: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'expenses_new'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leftover, 0);
    }

    #[test]
    fn test_drop_tables_then_migrate() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        db.insert_expenses(u.id, &[expense("coffee", -300, day(2024, 1, 2))])
            .unwrap();

        db.drop_tables().unwrap();
        assert_eq!(db.schema_version().unwrap(), 0);

        assert_eq!(db.apply_migrations().unwrap(), 11);
        assert!(db.get_user_by_username("alice").unwrap_err().is_not_found());
    }

    #[test]
    fn test_invalid_journal_mode() {
        let config = crate::config::DbConfig {
            journal_mode: "SIDEWAYS".to_string(),
            ..Default::default()
        };
        assert!(matches!(Database::open(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_create_user_adds_exclude_category() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");

        let categories = db.get_categories(u.id).unwrap();
        assert_eq!(categories.len(), 1);
        assert!(categories[0].is_exclude());
        assert_eq!(categories[0].pattern, EXCLUDE_CATEGORY_PATTERN);

        let fetched = db.get_user_by_id(u.id).unwrap();
        assert_eq!(fetched.username, "alice");
        assert_eq!(fetched.password_hash, "hash");
    }

    #[test]
    fn test_duplicate_username_is_conflict() {
        let db = Database::in_memory().unwrap();
        user(&db, "alice");

        let err = db.create_user("alice", "other").unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Only one exclude category was created for the name
        let alice = db.get_user_by_username("alice").unwrap();
        assert_eq!(db.get_categories(alice.id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_user() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        user(&db, "bob");

        db.update_username(u.id, "alicia").unwrap();
        db.update_password(u.id, "new-hash").unwrap();
        let fetched = db.get_user_by_id(u.id).unwrap();
        assert_eq!(fetched.username, "alicia");
        assert_eq!(fetched.password_hash, "new-hash");

        assert!(matches!(
            db.update_username(u.id, "bob"),
            Err(Error::Conflict(_))
        ));
        assert!(db.update_password(999, "x").unwrap_err().is_not_found());
        assert!(db.get_user_by_id(999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_session_lifecycle() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");

        let session = db
            .create_session(u.id, Utc::now() + Duration::hours(1))
            .unwrap();
        assert_eq!(session.id.len(), 32);

        let fetched = db.get_session(&session.id).unwrap();
        assert_eq!(fetched.user_id, u.id);
        assert_eq!(fetched.expires_at, session.expires_at);

        db.delete_session(&session.id).unwrap();
        assert!(db.get_session(&session.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_expired_session_is_not_found() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");

        let expired = db
            .create_session(u.id, Utc::now() - Duration::seconds(5))
            .unwrap();
        let live = db
            .create_session(u.id, Utc::now() + Duration::hours(1))
            .unwrap();

        assert!(db.get_session(&expired.id).unwrap_err().is_not_found());
        assert_eq!(db.delete_expired_sessions().unwrap(), 1);
        assert!(db.get_session(&live.id).is_ok());
    }

    #[test]
    fn test_category_crud() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");

        let id = db.create_category(u.id, "Food", "restaurant|food").unwrap();
        let category = db.get_category(u.id, id).unwrap();
        assert_eq!(category.name, "Food");

        db.update_category(u.id, id, "Eating out", "restaurant").unwrap();
        let category = db.get_category(u.id, id).unwrap();
        assert_eq!(category.name, "Eating out");
        assert_eq!(category.pattern, "restaurant");

        assert!(matches!(
            db.create_category(u.id, "Eating out", "x"),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            db.create_category(u.id, "Broken", "(unclosed"),
            Err(Error::Validation(_))
        ));
        assert!(db
            .update_category(u.id, 999, "Nope", "x")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_category_names_are_unique_per_user() {
        let db = Database::in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        db.create_category(alice.id, "Food", "food").unwrap();
        db.create_category(bob.id, "Food", "food").unwrap();

        let bob_food = db.get_categories(bob.id).unwrap();
        assert!(bob_food.iter().all(|c| c.user_id == bob.id));
        let alice_id = db.get_categories(alice.id).unwrap()[1].id;
        assert!(db.get_category(bob.id, alice_id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_category_uncategorizes_expenses() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        let id = db.create_category(u.id, "Food", "food").unwrap();

        db.insert_expenses(
            u.id,
            &[expense("food", -100, day(2024, 1, 1)).with_category(Some(id))],
        )
        .unwrap();

        db.delete_category(u.id, id).unwrap();
        assert!(db.get_category(u.id, id).unwrap_err().is_not_found());

        let expenses = db.get_all_expenses(u.id).unwrap();
        assert_eq!(expenses[0].category_id, None);
    }

    #[test]
    fn test_delete_exclude_category_is_refused() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        let exclude = db.get_exclude_category(u.id).unwrap();

        assert!(matches!(
            db.delete_category(u.id, exclude.id),
            Err(Error::Validation(_))
        ));
        assert!(db.get_exclude_category(u.id).is_ok());
    }

    #[test]
    fn test_delete_categories_preserves_exclude() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        let other = user(&db, "bob");
        let food = db.create_category(u.id, "Food", "food").unwrap();
        let taxi = db.create_category(u.id, "Transport", "taxi").unwrap();
        let bob_food = db.create_category(other.id, "Food", "food").unwrap();
        let exclude = db.get_exclude_category(u.id).unwrap();

        db.insert_expenses(
            u.id,
            &[
                expense("food", -100, day(2024, 1, 1)).with_category(Some(food)),
                expense("taxi", -200, day(2024, 1, 2)).with_category(Some(taxi)),
                expense("transfer", -300, day(2024, 1, 3)).with_category(Some(exclude.id)),
            ],
        )
        .unwrap();
        db.insert_expenses(
            other.id,
            &[expense("food", -100, day(2024, 1, 1)).with_category(Some(bob_food))],
        )
        .unwrap();

        assert_eq!(db.delete_categories(u.id).unwrap(), 2);

        let remaining = db.get_categories(u.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].is_exclude());

        for e in db.get_all_expenses(u.id).unwrap() {
            if e.description == "transfer" {
                assert_eq!(e.category_id, Some(exclude.id));
            } else {
                assert_eq!(e.category_id, None);
            }
        }

        // Other users are untouched
        assert_eq!(db.get_categories(other.id).unwrap().len(), 2);
        assert_eq!(
            db.get_all_expenses(other.id).unwrap()[0].category_id,
            Some(bob_food)
        );
    }

    #[test]
    fn test_insert_expenses_ignores_duplicates() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        let batch = vec![
            expense("coffee", -300, day(2024, 1, 2)),
            expense("salary", 500000, day(2024, 1, 3)),
        ];

        assert_eq!(db.insert_expenses(u.id, &batch).unwrap(), 2);
        assert_eq!(db.insert_expenses(u.id, &batch).unwrap(), 0);
        assert_eq!(db.get_all_expenses(u.id).unwrap().len(), 2);

        // The same row is not a duplicate for another user
        let other = user(&db, "bob");
        assert_eq!(db.insert_expenses(other.id, &batch).unwrap(), 2);
    }

    #[test]
    fn test_insert_expenses_each_flags_rows() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        db.insert_expenses(u.id, &[expense("coffee", -300, day(2024, 1, 2))])
            .unwrap();

        let batch = vec![
            expense("coffee", -300, day(2024, 1, 2)),
            expense("tea", -200, day(2024, 1, 3)),
        ];
        assert_eq!(db.insert_expenses_each(u.id, &batch).unwrap(), vec![false, true]);
    }

    #[test]
    fn test_insert_expenses_is_all_or_nothing() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");

        // The second row points at a missing category and fails the batch
        let batch = vec![
            expense("coffee", -300, day(2024, 1, 2)),
            expense("tea", -200, day(2024, 1, 3)).with_category(Some(9999)),
        ];
        assert!(db.insert_expenses_each(u.id, &batch).is_err());
        assert!(db.get_all_expenses(u.id).unwrap().is_empty());
    }

    #[test]
    fn test_expense_roundtrip_fields() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        db.insert_expenses(u.id, &[expense("coffee", -300, day(2024, 1, 2))])
            .unwrap();

        let stored = &db.get_all_expenses(u.id).unwrap()[0];
        assert_eq!(stored.user_id, u.id);
        assert_eq!(stored.source, "TestBank");
        assert_eq!(stored.amount, -300);
        assert_eq!(stored.expense_type, ExpenseType::Charge);
        assert_eq!(stored.date, day(2024, 1, 2));
        assert_eq!(stored.currency, "USD");
        assert_eq!(stored.category_id, None);

        assert_eq!(db.get_expense(u.id, stored.id).unwrap(), *stored);
    }

    #[test]
    fn test_user_isolation() {
        let db = Database::in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        db.insert_expenses(alice.id, &[expense("coffee shop", -300, day(2024, 1, 2))])
            .unwrap();
        db.insert_expenses(bob.id, &[expense("coffee beans", -900, day(2024, 1, 5))])
            .unwrap();

        let alice_rows = db.search_expenses(alice.id, "coffee").unwrap();
        assert_eq!(alice_rows.len(), 1);
        assert_eq!(alice_rows[0].description, "coffee shop");

        let bob_row = db.get_all_expenses(bob.id).unwrap().remove(0);
        assert!(db.get_expense(alice.id, bob_row.id).unwrap_err().is_not_found());
        assert!(db.delete_expense(alice.id, bob_row.id).unwrap_err().is_not_found());

        let filtered = db
            .get_expenses_filtered(alice.id, &ExpenseFilter::default(), &SortOptions::default())
            .unwrap();
        assert!(filtered.iter().all(|e| e.user_id == alice.id));

        assert_eq!(
            db.get_first_expense(bob.id).unwrap().description,
            "coffee beans"
        );
    }

    #[test]
    fn test_update_expenses_cannot_take_other_users_rows() {
        let db = Database::in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        db.insert_expenses(bob.id, &[expense("rent", -100000, day(2024, 1, 1))])
            .unwrap();

        let mut stolen = db.get_all_expenses(bob.id).unwrap().remove(0);
        stolen.description = "mine now".to_string();

        assert_eq!(db.update_expenses(alice.id, &[stolen]).unwrap(), 0);
        assert_eq!(db.get_all_expenses(bob.id).unwrap()[0].description, "rent");
        assert!(db.get_all_expenses(alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_update_expenses_and_single_update() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        let food = db.create_category(u.id, "Food", "food").unwrap();
        db.insert_expenses(
            u.id,
            &[
                expense("food market", -100, day(2024, 1, 1)),
                expense("taxi", -200, day(2024, 1, 2)),
            ],
        )
        .unwrap();

        let mut rows = db.get_expenses_without_category(u.id).unwrap();
        assert_eq!(db.count_expenses_without_category(u.id).unwrap(), 2);
        for row in rows.iter_mut().filter(|e| e.description.contains("food")) {
            row.category_id = Some(food);
        }
        assert_eq!(db.update_expenses(u.id, &rows).unwrap(), 2);
        assert_eq!(db.get_expenses_by_category(u.id, food).unwrap().len(), 1);

        let mut taxi = db.get_expenses_without_category_matching(u.id, "tax").unwrap();
        assert_eq!(taxi.len(), 1);
        let mut taxi = taxi.remove(0);
        taxi.amount = -250;
        db.update_expense(u.id, &taxi).unwrap();
        assert_eq!(db.get_expense(u.id, taxi.id).unwrap().amount, -250);

        taxi.id = 999;
        assert!(db.update_expense(u.id, &taxi).unwrap_err().is_not_found());
    }

    #[test]
    fn test_charges_and_income_reads() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        db.insert_expenses(
            u.id,
            &[
                expense("coffee", -300, day(2024, 1, 2)),
                expense("salary", 500000, day(2024, 1, 3)),
            ],
        )
        .unwrap();

        let charges = db.get_expenses(u.id).unwrap();
        assert_eq!(charges.len(), 1);
        assert_eq!(charges[0].expense_type, ExpenseType::Charge);

        // Income never shows up as uncategorized work
        assert_eq!(db.get_expenses_without_category(u.id).unwrap().len(), 1);
        assert_eq!(db.get_all_expenses(u.id).unwrap().len(), 2);
        assert_eq!(db.search_expenses_by_description(u.id, "salary").unwrap().len(), 1);
        assert!(db.search_expenses_by_description(u.id, "sal").unwrap().is_empty());
    }

    #[test]
    fn test_date_range_and_first_expense() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        assert!(db.get_first_expense(u.id).unwrap_err().is_not_found());

        db.insert_expenses(
            u.id,
            &[
                expense("feb", -1, day(2024, 2, 10)),
                expense("jan", -1, day(2024, 1, 10)),
                expense("mar", -1, day(2024, 3, 10)),
            ],
        )
        .unwrap();

        assert_eq!(db.get_first_expense(u.id).unwrap().description, "jan");

        let (start, end) = crate::period::month_range(2, 2024).unwrap();
        let feb = db.get_expenses_from_date_range(u.id, start, end).unwrap();
        assert_eq!(feb.len(), 1);
        assert_eq!(feb[0].description, "feb");
    }

    #[test]
    fn test_filtered_query() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        db.insert_expenses(
            u.id,
            &[
                expense("jan", -100, day(2024, 1, 15)),
                expense("feb", -200, day(2024, 2, 15)),
                expense("mar", -300, day(2024, 3, 15)),
            ],
        )
        .unwrap();

        let (filter, sort) = crate::filter::parse_expense_filters([
            ("date_from", "2024-02-01"),
            ("date_to", "2024-02-28"),
            ("sort", "date:asc"),
        ])
        .unwrap();
        let rows = db.get_expenses_filtered(u.id, &filter, &sort).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "feb");
        assert_eq!(db.count_expenses_filtered(u.id, &filter).unwrap(), 1);
    }

    #[test]
    fn test_filtered_amount_bounds_and_sort() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        db.insert_expenses(
            u.id,
            &[
                expense("small", -100, day(2024, 1, 1)),
                expense("medium", -200, day(2024, 1, 2)),
                expense("large", -300, day(2024, 1, 3)),
            ],
        )
        .unwrap();

        let filter = ExpenseFilter {
            amount_min: Some(-300),
            amount_max: Some(-200),
            ..Default::default()
        };
        let sort = SortOptions {
            field: SortField::Amount,
            direction: SortDirection::Asc,
        };
        let rows = db.get_expenses_filtered(u.id, &filter, &sort).unwrap();
        let names: Vec<_> = rows.iter().map(|e| e.description.as_str()).collect();
        assert_eq!(names, vec!["large", "medium"]);
    }

    #[test]
    fn test_filtered_date_to_covers_whole_day() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        let late = Utc.with_ymd_and_hms(2024, 2, 28, 23, 59, 59).unwrap();
        db.insert_expenses(u.id, &[expense("late", -1, late)]).unwrap();

        let filter = ExpenseFilter {
            date_to: NaiveDate::from_ymd_opt(2024, 2, 28),
            ..Default::default()
        };
        let rows = db
            .get_expenses_filtered(u.id, &filter, &SortOptions::default())
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_deleting_user_cascades() {
        let db = Database::in_memory().unwrap();
        let u = user(&db, "alice");
        db.create_session(u.id, Utc::now() + Duration::hours(1))
            .unwrap();
        db.insert_expenses(u.id, &[expense("coffee", -300, day(2024, 1, 2))])
            .unwrap();

        let conn = db.conn().unwrap();
        conn.execute("DELETE FROM expenses WHERE user_id = ?", params![u.id])
            .unwrap();
        conn.execute("DELETE FROM categories WHERE user_id = ?", params![u.id])
            .unwrap();
        conn.execute("DELETE FROM users WHERE id = ?", params![u.id])
            .unwrap();

        let sessions: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sessions WHERE user_id = ?",
                params![u.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(sessions, 0);
    }
}
