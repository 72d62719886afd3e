//! Integration tests for the public API
//!
//! These tests verify connection string handling, placeholder rewriting,
//! and result accessors. They do not need an Oracle client library.

use oracle_oci::{
    placeholders, Dsn, Error, ExecResult, Location, PrivilegedMode, TransactionMode,
};
use proptest::prelude::*;

mod dsn_tests {
    use super::*;

    #[test]
    fn test_dsn_from_connection_string() {
        let dsn: Dsn = "oracle://u/p@host:1521/svc?loc=UTC&isolation=SERIALIZABLE&prefetch_rows=20&questionph=YES"
            .parse()
            .unwrap();
        assert_eq!(dsn.username(), "u");
        assert_eq!(dsn.connect(), "host:1521/svc");
        assert_eq!(dsn.location(), Location::parse("UTC").unwrap());
        assert_eq!(dsn.transaction_mode(), TransactionMode::Serializable);
        assert_eq!(dsn.prefetch_rows(), 20);
        assert!(dsn.question_mark_placeholders());
    }

    #[test]
    fn test_scheme_is_optional() {
        let with: Dsn = "oracle://scott/tiger@dbhost".parse().unwrap();
        let without: Dsn = "scott/tiger@dbhost".parse().unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_host_only() {
        let dsn: Dsn = "dbhost:1521/XE".parse().unwrap();
        assert_eq!(dsn.username(), "");
        assert_eq!(dsn.connect(), "dbhost:1521/XE");
        assert!(!dsn.external_auth());
    }

    #[test]
    fn test_external_auth() {
        let dsn: Dsn = "oracle://".parse().unwrap();
        assert!(dsn.external_auth());
        assert_eq!(dsn.username(), "");
        assert_eq!(dsn.connect(), "");
    }

    #[test]
    fn test_empty_loc_is_utc() {
        let dsn: Dsn = "u/p@h?loc=".parse().unwrap();
        assert_eq!(dsn.location(), Location::parse("UTC").unwrap());
    }

    #[test]
    fn test_errors_are_configuration_errors() {
        for bad in [
            "",
            "u/p@h?isolation=SNAPSHOT",
            "u/p@h?questionph=1",
            "u/p@h?prefetch_rows=ten",
            "u/p@h?as=root",
            "u/p@h?loc=Nowhere/City",
            "u%zz/p@h",
            "u/p@h%41",
        ] {
            let err = bad.parse::<Dsn>().unwrap_err();
            assert!(err.is_configuration_error(), "{}: {:?}", bad, err);
        }
    }

    #[test]
    fn test_builder_derives_external_auth() {
        assert!(Dsn::builder().build().unwrap().external_auth());
        assert!(!Dsn::builder().connect("dbhost").build().unwrap().external_auth());
        assert!(Dsn::builder()
            .privileged_mode(PrivilegedMode::SysDba)
            .build()
            .unwrap()
            .external_auth());
    }

    #[test]
    fn test_connect_with_question_mark_roundtrips() {
        let dsn: Dsn = "scott/tiger@dbhost/svc?x?isolation=READONLY".parse().unwrap();
        assert_eq!(dsn.connect(), "dbhost/svc?x");

        let reparsed: Dsn = dsn.to_string().parse().unwrap();
        assert_eq!(reparsed, dsn);
    }

    #[test]
    fn test_builder_rejects_connect_with_at_sign() {
        let err = Dsn::builder()
            .username("scott")
            .connect("db@host")
            .build()
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_prefetch_rejects_plus_sign() {
        let err = "u/p@h?prefetch_rows=%2B5".parse::<Dsn>().unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_display_omits_defaults() {
        let dsn: Dsn = "scott/tiger@dbhost?prefetch_rows=10&isolation=DEFAULT"
            .parse()
            .unwrap();
        assert_eq!(dsn.to_string(), "oracle://scott/tiger@dbhost");
    }
}

mod placeholder_tests {
    use super::*;

    #[test]
    fn test_rewrite() {
        assert_eq!(
            placeholders("SELECT * FROM t WHERE a=? AND b=?"),
            "SELECT * FROM t WHERE a=:1 AND b=:2"
        );
    }

    #[test]
    fn test_many_markers() {
        let sql = vec!["?"; 12].join(",");
        let rewritten = placeholders(&sql);
        assert!(rewritten.ends_with(",:11,:12"));
        assert!(!rewritten.contains('?'));
    }
}

mod result_tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let result = ExecResult::new(Err(Error::oracle(1, "unsupported")), Ok(5));
        assert_eq!(result.last_insert_id().unwrap_err().oracle_code(), Some(1));
        assert_eq!(result.rows_affected().unwrap(), 5);
    }

    #[test]
    fn test_accessors_are_repeatable() {
        let result = ExecResult::new(Ok(7), Ok(1));
        assert_eq!(result.last_insert_id().unwrap(), 7);
        assert_eq!(result.last_insert_id().unwrap(), 7);
    }
}

fn location() -> impl Strategy<Value = Location> {
    prop::sample::select(vec!["Local", "UTC", "Europe/Oslo", "America/New_York", "Asia/Tokyo"])
        .prop_map(|name| Location::parse(name).unwrap())
}

fn transaction_mode() -> impl Strategy<Value = TransactionMode> {
    prop::sample::select(vec![
        TransactionMode::ReadWrite,
        TransactionMode::ReadOnly,
        TransactionMode::Serializable,
    ])
}

fn privileged_mode() -> impl Strategy<Value = PrivilegedMode> {
    prop::sample::select(vec![
        PrivilegedMode::Default,
        PrivilegedMode::SysDba,
        PrivilegedMode::SysAsm,
        PrivilegedMode::SysOper,
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// A serialized Dsn parses back to the same value
    #[test]
    fn test_dsn_display_roundtrip(
        username in ".{0,16}",
        password in ".{0,16}",
        connect in "[a-zA-Z0-9.:/_%?-]{0,24}",
        location in location(),
        transaction_mode in transaction_mode(),
        questionph in any::<bool>(),
        prefetch_rows in any::<u32>(),
        prefetch_memory in any::<u32>(),
        privileged_mode in privileged_mode(),
    ) {
        let dsn = Dsn::builder()
            .username(username)
            .password(password)
            .connect(connect)
            .location(location)
            .transaction_mode(transaction_mode)
            .question_mark_placeholders(questionph)
            .prefetch_rows(prefetch_rows)
            .prefetch_memory(prefetch_memory)
            .privileged_mode(privileged_mode)
            .build()
            .unwrap();

        let reparsed: Dsn = dsn.to_string().parse().unwrap();
        prop_assert_eq!(reparsed, dsn);
    }

    /// Rewriting never leaves a marker behind and is stable
    #[test]
    fn test_placeholders_stable(sql in "[a-z ?=,']{0,64}") {
        let once = placeholders(&sql).into_owned();
        prop_assert!(!once.contains('?'));
        let twice = placeholders(&once).into_owned();
        prop_assert_eq!(once, twice);
    }
}
