use std::{collections::HashMap, fmt, num::ParseIntError, path::Path, str::FromStr};

use csv::Trim;
use log::debug;
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::Deserialize;

use crate::{record::Record, Error};

/// A field value after transformation, bound as a statement parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(value) => ToSqlOutput::from(*value),
            Value::Text(value) => ToSqlOutput::from(value.as_str()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "kebab-case")]
pub enum Transform {
    /// `yes` becomes 1, anything else 0.
    YesNo,
    Integer,
    Text,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} in column {column:?}")]
pub struct InvalidValue {
    pub column: String,
    pub value: String,
}

impl Transform {
    pub fn apply(self, value: &str) -> Result<Value, ParseIntError> {
        match self {
            Transform::YesNo => Ok(Value::Integer(match value {
                "yes" => 1,
                _ => 0,
            })),
            Transform::Integer if value.is_empty() => Ok(Value::Null),
            Transform::Integer => value.parse().map(Value::Integer),
            Transform::Text => Ok(Value::Text(value.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseRuleError {
    #[error("expected COLUMN=KIND, got {0:?}")]
    Syntax(String),
    #[error("unknown transform {0:?}, expected one of yes-no, integer, text")]
    Kind(String),
}

impl FromStr for Transform {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes-no" => Ok(Transform::YesNo),
            "integer" => Ok(Transform::Integer),
            "text" => Ok(Transform::Text),
            _ => Err(ParseRuleError::Kind(s.into())),
        }
    }
}

/// Binds a [`Transform`] to a column, written as `COLUMN=KIND` on the
/// command line or as a `column,kind` row in a rules file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransformRule {
    pub column: String,
    pub kind: Transform,
}

impl FromStr for TransformRule {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((column, kind)) = s.split_once('=') else {
            return Err(ParseRuleError::Syntax(s.into()));
        };
        let column = column.trim();
        if column.is_empty() {
            return Err(ParseRuleError::Syntax(s.into()));
        }
        Ok(Self {
            column: column.into(),
            kind: kind.trim().parse()?,
        })
    }
}

/// Column name to transform. Columns without a rule pass through as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transforms(HashMap<String, Transform>);

impl Default for Transforms {
    fn default() -> Self {
        Self::empty().with(TransformRule {
            column: "is_alive".into(),
            kind: Transform::YesNo,
        })
    }
}

impl Transforms {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    pub fn with(mut self, rule: TransformRule) -> Self {
        self.insert(rule);
        self
    }

    pub fn insert(&mut self, rule: TransformRule) {
        if let Some(previous) = self.0.insert(rule.column.clone(), rule.kind) {
            debug!(
                "rule {:?} for column {:?} replaces {previous:?}",
                rule.kind, rule.column
            );
        }
    }

    pub fn load(&mut self, path: &Path) -> Result<(), Error> {
        let error = |source| Error::Transforms {
            path: path.to_path_buf(),
            source,
        };
        let mut rdr = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .from_path(path)
            .map_err(error)?;
        for rule in rdr.deserialize() {
            self.insert(rule.map_err(error)?);
        }
        Ok(())
    }

    pub fn get(&self, column: &str) -> Transform {
        self.0.get(column).copied().unwrap_or(Transform::Text)
    }

    /// Transforms every field of `record`, in header order.
    pub fn apply(&self, record: &Record) -> Result<Vec<Value>, InvalidValue> {
        record
            .iter()
            .map(|(column, value)| {
                self.get(column).apply(value).map_err(|_| InvalidValue {
                    column: column.into(),
                    value: value.into(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;
    use testresult::TestResult;

    use super::*;
    use crate::record::Records;

    #[rstest]
    #[case("yes", 1)]
    #[case("no", 0)]
    #[case("", 0)]
    #[case("Yes", 0)]
    #[case("maybe", 0)]
    fn yes_no(#[case] input: &str, #[case] expected: i64) {
        assert_eq!(Transform::YesNo.apply(input), Ok(Value::Integer(expected)));
    }

    #[test]
    fn integer() {
        assert_eq!(Transform::Integer.apply("48"), Ok(Value::Integer(48)));
        assert_eq!(Transform::Integer.apply("-3"), Ok(Value::Integer(-3)));
        assert_eq!(Transform::Integer.apply(""), Ok(Value::Null));
        assert!(Transform::Integer.apply("forty").is_err());
    }

    #[rstest]
    #[case("is_alive=yes-no", "is_alive", Transform::YesNo)]
    #[case(" age = integer ", "age", Transform::Integer)]
    #[case("is_alive=text", "is_alive", Transform::Text)]
    fn parses_rules(#[case] input: &str, #[case] column: &str, #[case] kind: Transform) -> TestResult {
        let rule: TransformRule = input.parse()?;
        assert_eq!(rule.column, column);
        assert_eq!(rule.kind, kind);
        Ok(())
    }

    #[rstest]
    #[case("is_alive")]
    #[case("=yes-no")]
    #[case("is_alive=boolean")]
    fn rejects_rules(#[case] input: &str) {
        assert!(input.parse::<TransformRule>().is_err());
    }

    #[test]
    fn applies_in_header_order() -> TestResult {
        let mut records = Records::from_reader(
            "first_name,age,is_alive\nGraham,48,no\nJohn,78,yes\n".as_bytes(),
        )?;
        let transforms = Transforms::default().with("age=integer".parse()?);
        let graham = records.next().expect("one record")?;
        assert_eq!(
            transforms.apply(&graham)?,
            vec![
                Value::Text("Graham".into()),
                Value::Integer(48),
                Value::Integer(0)
            ]
        );
        let john = records.next().expect("one record")?;
        assert_eq!(transforms.apply(&john)?[2], Value::Integer(1));
        Ok(())
    }

    #[test]
    fn reports_invalid_values() -> TestResult {
        let mut records = Records::from_reader("age\nforty-eight\n".as_bytes())?;
        let record = records.next().expect("one record")?;
        let transforms = Transforms::empty().with("age=integer".parse()?);
        let err = transforms.apply(&record).unwrap_err();
        assert_eq!(err.column, "age");
        assert_eq!(err.value, "forty-eight");
        Ok(())
    }

    #[test]
    fn later_rules_win() -> TestResult {
        let transforms = Transforms::default().with("is_alive=text".parse()?);
        assert_eq!(transforms.get("is_alive"), Transform::Text);
        assert_eq!(transforms.get("unknown"), Transform::Text);
        Ok(())
    }

    #[test]
    fn loads_rules_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut file, b"column,kind\nage, integer\nalive,yes-no\n")?;
        let mut transforms = Transforms::empty();
        transforms.load(file.path())?;
        assert_eq!(transforms.get("age"), Transform::Integer);
        assert_eq!(transforms.get("alive"), Transform::YesNo);
        Ok(())
    }

    #[test]
    fn bad_rules_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        std::io::Write::write_all(&mut file, b"column,kind\nage,float\n")?;
        let result = Transforms::empty().load(file.path());
        assert!(matches!(result, Err(Error::Transforms { .. })));
        Ok(())
    }

    proptest! {
        #[test]
        fn transforms_are_pure(kind in any::<Transform>(), input in ".*") {
            prop_assert_eq!(kind.apply(&input), kind.apply(&input));
        }

        #[test]
        fn yes_no_is_binary(input in ".*") {
            let expected = if input == "yes" { 1 } else { 0 };
            prop_assert_eq!(Transform::YesNo.apply(&input), Ok(Value::Integer(expected)));
        }
    }
}
