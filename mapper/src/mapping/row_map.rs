//! Mapping definitions and the per-row parse.
//!
//! A [`RowMapBuilder`] collects field declarations in order. Bare
//! declarations claim the column under the cursor; explicit ones jump the
//! cursor just past the column they claim:
//!
//! ```text
//! b.field("a");        // a <- col 0, cursor 1
//! b.skip();            //              cursor 2
//! b.field_at("c", 5);  // c <- col 5, cursor 6
//! b.field("d").at(1);  // d <- col 1, cursor 7
//! b.field("e");        // e <- col 7, cursor 8
//! ```
//!
//! [`RowMapBuilder::build`] resolves every named transform and hook and
//! fixes the target type. The resulting [`RowMap`] is immutable and can be
//! shared across threads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::attribute::{AttributeMap, Transform};
use super::context::{Context, Hook, HookRef, MapContext};
use super::header::attribute_names;
use super::target::{MapTarget, Record, Schema};
use crate::error::{CsvError, MapError, MapResult};
use crate::logs::{LogEntry, LOG_BROADCASTER};
use crate::parser::{ParserOptions, Row, RowSource};

/// Builds a fresh target for each row.
pub type TargetFactory<T> = Arc<dyn Fn(&Arc<Schema>) -> T + Send + Sync>;

/// What to do when a field name is declared more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep every declaration; the last one assigned wins.
    #[default]
    ShadowLast,
    /// Fail the build.
    Reject,
}

/// Inclusive range of source row indices handed to [`RowMap::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    /// `None` = until the end of input
    pub stop: Option<usize>,
}

impl RowRange {
    pub fn contains(&self, row: usize) -> bool {
        row >= self.start && self.stop.map_or(true, |stop| row <= stop)
    }

    /// No row at or after `row` can be in range.
    pub fn is_past(&self, row: usize) -> bool {
        self.stop.is_some_and(|stop| row > stop)
    }
}

impl Default for RowRange {
    fn default() -> Self {
        Self { start: 0, stop: None }
    }
}

/// Collects a mapping definition.
pub struct RowMapBuilder<T = Record> {
    context: Arc<dyn MapContext>,
    attributes: Vec<AttributeMap>,
    cursor: usize,
    before: Vec<HookRef>,
    after: Vec<HookRef>,
    rows: RowRange,
    delimiter: u8,
    options: ParserOptions,
    duplicates: DuplicatePolicy,
    factory: TargetFactory<T>,
}

impl RowMapBuilder<Record> {
    /// Builder with an empty evaluation context.
    pub fn new() -> Self {
        Self::with_context(Context::new())
    }

    /// Builder resolving named transforms and hooks against `context`.
    pub fn with_context(context: impl MapContext + 'static) -> Self {
        Self::with_shared_context(Arc::new(context))
    }

    pub fn with_shared_context(context: Arc<dyn MapContext>) -> Self {
        let options = ParserOptions::default();
        Self {
            context,
            attributes: Vec::new(),
            cursor: 0,
            before: Vec::new(),
            after: Vec::new(),
            rows: RowRange::default(),
            delimiter: options.delimiter,
            options,
            duplicates: DuplicatePolicy::default(),
            factory: Arc::new(|schema: &Arc<Schema>| Record::new(schema)),
        }
    }
}

impl Default for RowMapBuilder<Record> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MapTarget> RowMapBuilder<T> {
    // -------------------------------------------------------------------------
    // Field declarations
    // -------------------------------------------------------------------------

    /// Declare `name` at the cursor and advance the cursor by one.
    pub fn field(&mut self, name: impl Into<String>) -> &mut AttributeMap {
        let index = self.cursor;
        self.cursor += 1;
        self.add_attribute(name, Some(index))
    }

    /// Declare `name` at `index`; the cursor moves to `index + 1`.
    pub fn field_at(&mut self, name: impl Into<String>, index: usize) -> &mut AttributeMap {
        self.cursor = index.saturating_add(1);
        self.add_attribute(name, Some(index))
    }

    /// Declare several bare fields in order.
    pub fn fields<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.field(name);
        }
        self
    }

    /// Leave the column under the cursor unmapped.
    pub fn skip(&mut self) -> &mut Self {
        self.move_cursor(1)
    }

    /// Move the cursor relative to its position, saturating at zero.
    pub fn move_cursor(&mut self, positions: isize) -> &mut Self {
        self.cursor = self.cursor.saturating_add_signed(positions);
        self
    }

    /// Next column a bare declaration will claim.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Append an attribute without touching the cursor.
    pub fn add_attribute(&mut self, name: impl Into<String>, index: Option<usize>) -> &mut AttributeMap {
        let slot = self.attributes.len();
        self.attributes.push(AttributeMap::new(name, index));
        &mut self.attributes[slot]
    }

    /// Declared attributes in declaration order.
    pub fn attributes(&self) -> &[AttributeMap] {
        &self.attributes
    }

    /// Declare one field per column of the source's first row.
    ///
    /// Names come from [`crate::mapping::header::attribute_name`]. The cursor
    /// is left alone, parsing is forced to start at row 1 or later, and the
    /// source is rewound so the import loop sees the header again.
    pub fn read_attributes_from(
        &mut self,
        source: &mut dyn RowSource,
        aliases: &HashMap<String, String>,
    ) -> MapResult<&mut Self> {
        let header = source.read_row()?.ok_or(CsvError::NoHeaders)?;
        self.rows.start = self.rows.start.max(1);
        source.rewind()?;

        for (index, name) in attribute_names(&header, aliases).into_iter().enumerate() {
            self.add_attribute(name, Some(index));
        }
        Ok(self)
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// First source row to parse.
    pub fn start_at_row(&mut self, row: usize) -> &mut Self {
        self.rows.start = row;
        self
    }

    /// Last source row to parse (inclusive).
    pub fn stop_at_row(&mut self, row: usize) -> &mut Self {
        self.rows.stop = Some(row);
        self
    }

    pub fn rows(&self) -> RowRange {
        self.rows
    }

    /// Column delimiter for the tokenizer.
    pub fn delimited_by(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Tokenizer options. The delimiter set with
    /// [`delimited_by`](Self::delimited_by) takes precedence.
    pub fn parser_options(&mut self, options: ParserOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn on_duplicate(&mut self, policy: DuplicatePolicy) -> &mut Self {
        self.duplicates = policy;
        self
    }

    /// Hooks run before field extraction, in order.
    pub fn before_row<I, H>(&mut self, hooks: I) -> &mut Self
    where
        I: IntoIterator<Item = H>,
        H: Into<HookRef>,
    {
        self.before.extend(hooks.into_iter().map(Into::into));
        self
    }

    /// Hooks run after every field is assigned, in order.
    pub fn after_row<I, H>(&mut self, hooks: I) -> &mut Self
    where
        I: IntoIterator<Item = H>,
        H: Into<HookRef>,
    {
        self.after.extend(hooks.into_iter().map(Into::into));
        self
    }

    /// Map rows onto targets made by `factory`.
    ///
    /// Each default becomes a field that never reads the row. A later
    /// declaration of the same name overrides it, under either
    /// [`DuplicatePolicy`].
    pub fn map_to<U, F, I, K>(self, factory: F, defaults: I) -> RowMapBuilder<U>
    where
        U: MapTarget,
        F: Fn() -> U + Send + Sync + 'static,
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut builder = RowMapBuilder {
            context: self.context,
            attributes: self.attributes,
            cursor: self.cursor,
            before: self.before,
            after: self.after,
            rows: self.rows,
            delimiter: self.delimiter,
            options: self.options,
            duplicates: self.duplicates,
            factory: Arc::new(move |_: &Arc<Schema>| factory()),
        };
        for (name, value) in defaults {
            builder.default_value(name, value);
        }
        builder
    }

    /// Field that is always `value` and never reads the row.
    pub fn default_value(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.add_attribute(name, None).map(Transform::Constant(value));
        self
    }

    /// [`map_to`](Self::map_to) using `U::default` and no defaults.
    pub fn map_to_default<U>(self) -> RowMapBuilder<U>
    where
        U: MapTarget + Default + 'static,
    {
        self.map_to(U::default, std::iter::empty::<(String, Value)>())
    }

    // -------------------------------------------------------------------------
    // Build
    // -------------------------------------------------------------------------

    /// Resolve names, fix the target schema, and freeze the mapping.
    pub fn build(self) -> MapResult<RowMap<T>> {
        let mut seen = HashSet::new();
        let declared = self
            .attributes
            .iter()
            .filter(|a| !matches!(a.transform(), Some(Transform::Constant(_))));
        for attr in declared {
            if !seen.insert(attr.name()) {
                match self.duplicates {
                    DuplicatePolicy::Reject => {
                        return Err(MapError::DuplicateField(attr.name().to_string()))
                    }
                    DuplicatePolicy::ShadowLast => LOG_BROADCASTER.log(
                        LogEntry::warning("declared more than once; the last declaration wins")
                            .for_field(attr.name()),
                    ),
                }
            }
        }

        let context = self.context.as_ref();
        let mut attributes = self.attributes;
        for attr in &mut attributes {
            attr.resolve(context)?;
        }
        let before = resolve_hooks(self.before, context)?;
        let after = resolve_hooks(self.after, context)?;

        let schema = Arc::new(Schema::new(attributes.iter().map(|a| a.name().to_string())));

        Ok(RowMap {
            attributes,
            before,
            after,
            rows: self.rows,
            options: self.options.with_delimiter(self.delimiter),
            schema,
            factory: self.factory,
        })
    }
}

fn resolve_hooks(hooks: Vec<HookRef>, context: &dyn MapContext) -> MapResult<Vec<Hook>> {
    hooks
        .into_iter()
        .map(|hook| match hook {
            HookRef::Direct(f) => Ok(f),
            HookRef::Named(name) => context.hook(&name).ok_or(MapError::UnresolvedHook(name)),
        })
        .collect()
}

impl<T> fmt::Debug for RowMapBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowMapBuilder")
            .field("attributes", &self.attributes)
            .field("cursor", &self.cursor)
            .field("before", &self.before)
            .field("after", &self.after)
            .field("rows", &self.rows)
            .field("delimiter", &(self.delimiter as char))
            .finish_non_exhaustive()
    }
}

/// A built mapping definition.
pub struct RowMap<T = Record> {
    attributes: Vec<AttributeMap>,
    before: Vec<Hook>,
    after: Vec<Hook>,
    rows: RowRange,
    options: ParserOptions,
    schema: Arc<Schema>,
    factory: TargetFactory<T>,
}

impl<T: MapTarget> RowMap<T> {
    /// Map one row onto a fresh target.
    ///
    /// Before-hooks run first and may rewrite `row`; then every attribute
    /// is assigned in declaration order; then after-hooks run. The first
    /// failure aborts the row.
    pub fn parse(&self, row: &mut Row) -> MapResult<T> {
        let mut target = (self.factory)(&self.schema);

        for hook in &self.before {
            hook(row, &mut target)?;
        }

        for attr in &self.attributes {
            let value = attr.parse(row)?;
            target.set_field(attr.name(), value)?;
        }

        for hook in &self.after {
            hook(row, &mut target)?;
        }

        Ok(target)
    }
}

impl<T> RowMap<T> {
    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[AttributeMap] {
        &self.attributes
    }

    /// Field layout of the synthesized record type.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rows(&self) -> RowRange {
        self.rows
    }

    pub fn start_at_row(&self) -> usize {
        self.rows.start
    }

    pub fn stop_at_row(&self) -> Option<usize> {
        self.rows.stop
    }

    pub fn delimiter(&self) -> u8 {
        self.options.delimiter
    }

    /// Tokenizer options with the delimiter merged in.
    pub fn parser_options(&self) -> &ParserOptions {
        &self.options
    }
}

impl<T> Clone for RowMap<T> {
    fn clone(&self) -> Self {
        Self {
            attributes: self.attributes.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            rows: self.rows,
            options: self.options.clone(),
            schema: Arc::clone(&self.schema),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T> fmt::Debug for RowMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowMap")
            .field("attributes", &self.attributes)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .field("rows", &self.rows)
            .field("options", &self.options)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::CsvSource;
    use serde_json::{json, Map};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn row() -> Row {
        vec!["first_name".to_string(), "last_name".to_string()]
    }

    fn index_of(b: &RowMapBuilder, name: &str) -> Option<usize> {
        b.attributes().iter().find(|a| a.name() == name).and_then(|a| a.index())
    }

    #[derive(Debug, Default)]
    struct Person {
        foo: Option<String>,
        bar: Option<String>,
        baz: Option<String>,
    }

    impl MapTarget for Person {
        fn set_field(&mut self, name: &str, value: Value) -> MapResult<()> {
            let slot = match name {
                "foo" => &mut self.foo,
                "bar" => &mut self.bar,
                "baz" => &mut self.baz,
                other => return Err(MapError::MissingField(other.to_string())),
            };
            *slot = value.as_str().map(String::from);
            Ok(())
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "foo" => self.foo.clone().map(Value::from),
                "bar" => self.bar.clone().map(Value::from),
                "baz" => self.baz.clone().map(Value::from),
                _ => None,
            }
        }
    }

    #[test]
    fn test_bare_fields_are_positional() {
        let mut b = RowMapBuilder::new();
        b.fields(["a", "b", "c"]);
        let map = b.build().unwrap();

        let mut r: Row = vec!["x".into(), "y".into(), "z".into()];
        let rec = map.parse(&mut r).unwrap();
        assert_eq!(rec.get_str("a"), Some("x"));
        assert_eq!(rec.get_str("b"), Some("y"));
        assert_eq!(rec.get_str("c"), Some("z"));
    }

    #[test]
    fn test_skip_leaves_a_gap() {
        let mut b = RowMapBuilder::new();
        b.field("a");
        b.skip();
        b.field("b");
        let map = b.build().unwrap();

        let mut r: Row = vec!["0".into(), "1".into(), "2".into()];
        let rec = map.parse(&mut r).unwrap();
        assert_eq!(rec.get_str("a"), Some("0"));
        assert_eq!(rec.get_str("b"), Some("2"));
    }

    #[test]
    fn test_explicit_index_moves_cursor_past_it() {
        let mut b = RowMapBuilder::new();
        assert_eq!(b.field_at("a", 2).index(), Some(2));
        assert_eq!(b.cursor(), 3);
        b.field("b");
        assert_eq!(index_of(&b, "b"), Some(3));
    }

    #[test]
    fn test_explicit_index_at_max() {
        let mut b = RowMapBuilder::new();
        b.field_at("last", usize::MAX);
        assert_eq!(b.cursor(), usize::MAX);
    }

    #[test]
    fn test_explicit_index_can_go_backwards() {
        let mut b = RowMapBuilder::new();
        b.fields(["a", "b", "c"]);
        b.field_at("d", 0);
        b.field("e");
        assert_eq!(index_of(&b, "e"), Some(1));
    }

    #[test]
    fn test_at_does_not_move_cursor() {
        let mut b = RowMapBuilder::new();
        b.field("a").at(7);
        assert_eq!(b.cursor(), 1);
        b.field("b");
        assert_eq!(index_of(&b, "a"), Some(7));
        assert_eq!(index_of(&b, "b"), Some(1));
    }

    #[test]
    fn test_bare_field_claims_cursor() {
        let mut b = RowMapBuilder::new();
        let before = b.cursor();
        assert_eq!(b.field("first_name").index(), Some(before));
        assert_eq!(b.cursor(), before + 1);
    }

    #[test]
    fn test_move_cursor() {
        let mut b = RowMapBuilder::new();
        assert_eq!(b.cursor(), 0);
        b.move_cursor(1);
        assert_eq!(b.cursor(), 1);
        b.move_cursor(3);
        assert_eq!(b.cursor(), 4);
        b.move_cursor(-10);
        assert_eq!(b.cursor(), 0);
    }

    #[test]
    fn test_synthesized_record_has_declared_fields() {
        let mut b = RowMapBuilder::new();
        b.fields(["fname", "lname"]);
        let map = b.build().unwrap();

        assert_eq!(map.schema().fields(), ["fname", "lname"]);
        let rec = map.parse(&mut row()).unwrap();
        assert_eq!(rec.get_str("fname"), Some("first_name"));
        assert_eq!(rec.get_str("lname"), Some("last_name"));
    }

    #[test]
    fn test_map_to_with_defaults() {
        let mut b = RowMapBuilder::new().map_to(Person::default, [("baz", json!("default_baz"))]);
        b.fields(["foo", "bar"]);
        let map = b.build().unwrap();

        for mut r in [row(), vec!["1".into(), "2".into()]] {
            let person = map.parse(&mut r).unwrap();
            assert_eq!(person.baz.as_deref(), Some("default_baz"));
        }
        let person = map.parse(&mut row()).unwrap();
        assert_eq!(person.foo.as_deref(), Some("first_name"));
        assert_eq!(person.bar.as_deref(), Some("last_name"));
    }

    #[test]
    fn test_default_overridden_by_later_field() {
        let mut b = RowMapBuilder::new().map_to(Person::default, [("foo", json!("unused"))]);
        b.field("foo");
        let map = b.build().unwrap();
        assert_eq!(map.parse(&mut row()).unwrap().foo.as_deref(), Some("first_name"));
    }

    #[test]
    fn test_map_to_default_target() {
        let mut b = RowMapBuilder::new().map_to_default::<Person>();
        b.fields(["foo", "bar"]);
        let person = b.build().unwrap().parse(&mut row()).unwrap();
        assert_eq!(person.foo.as_deref(), Some("first_name"));
        assert_eq!(person.baz, None);
    }

    #[test]
    fn test_default_overridable_when_rejecting_duplicates() {
        let mut b = RowMapBuilder::new().map_to(Person::default, [("foo", json!("unused"))]);
        b.on_duplicate(DuplicatePolicy::Reject);
        b.field("foo");
        let map = b.build().unwrap();
        assert_eq!(map.parse(&mut row()).unwrap().foo.as_deref(), Some("first_name"));
    }

    #[test]
    fn test_target_without_member_fails() {
        let mut b = RowMapBuilder::new().map_to_default::<Person>();
        b.field("unknown");
        let map = b.build().unwrap();
        assert!(matches!(map.parse(&mut row()), Err(MapError::MissingField(_))));
    }

    #[test]
    fn test_open_map_target() {
        let mut b = RowMapBuilder::new().map_to_default::<Map<String, Value>>();
        b.fields(["x", "y"]);
        let map = b.build().unwrap();
        let obj = map.parse(&mut row()).unwrap();
        assert_eq!(obj["y"], json!("last_name"));
    }

    #[test]
    fn test_row_bounds() {
        let mut b = RowMapBuilder::new();
        assert_eq!(b.rows(), RowRange { start: 0, stop: None });
        b.start_at_row(1).stop_at_row(6);
        let map = b.build().unwrap();
        assert_eq!(map.start_at_row(), 1);
        assert_eq!(map.stop_at_row(), Some(6));
        assert!(map.rows().contains(6));
        assert!(!map.rows().contains(0));
        assert!(map.rows().is_past(7));
    }

    #[test]
    fn test_delimiter_and_parser_options() {
        let mut b = RowMapBuilder::new();
        b.parser_options(ParserOptions { trim: true, ..ParserOptions::default() })
            .delimited_by(b'|');
        assert_eq!(b.delimiter(), b'|');

        let map = b.build().unwrap();
        assert_eq!(map.delimiter(), b'|');
        assert!(map.parser_options().trim);
        assert_eq!(map.parser_options().delimiter, b'|');
    }

    #[test]
    fn test_before_row_hooks() {
        let context = Context::new().with_hook("change_name", |row: &mut Row, _: &mut dyn MapTarget| {
            row[0] = "changed_name".to_string();
            Ok(())
        });

        let mut b = RowMapBuilder::with_context(context);
        b.before_row([
            HookRef::named("change_name"),
            HookRef::direct(|row, _| {
                row[1] = "bar".to_string();
                Ok(())
            }),
        ]);
        b.fields(["first_name", "foo"]);
        let map = b.build().unwrap();

        let mut r = row();
        let rec = map.parse(&mut r).unwrap();
        assert_eq!(rec.get_str("first_name"), Some("changed_name"));
        assert_eq!(rec.get_str("foo"), Some("bar"));
        assert_eq!(r[1], "bar");
    }

    #[test]
    fn test_after_row_sees_populated_target() {
        let saw_value = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_value);

        let mut b = RowMapBuilder::new();
        b.field("a");
        b.after_row([HookRef::direct(move |_, target| {
            flag.store(target.field("a") == Some(json!("first_name")), Ordering::SeqCst);
            target.set_field("a", json!("overwritten"))
        })]);
        let map = b.build().unwrap();

        let rec = map.parse(&mut row()).unwrap();
        assert!(saw_value.load(Ordering::SeqCst));
        assert_eq!(rec.get_str("a"), Some("overwritten"));
    }

    #[test]
    fn test_hook_failure_aborts_row() {
        let mut b = RowMapBuilder::new();
        b.field("a");
        b.before_row([HookRef::direct(|_, _| Err(MapError::hook("bad row")))]);
        let map = b.build().unwrap();
        assert!(matches!(map.parse(&mut row()), Err(MapError::HookFailed(_))));
    }

    #[test]
    fn test_context_shared_with_fields() {
        let context = Context::new().with_indexed_transform("transform", |_, _| Ok(json!("transform_success")));
        let mut b = RowMapBuilder::with_context(context);
        b.field("first_name").map_named("transform");
        let map = b.build().unwrap();
        assert_eq!(
            map.parse(&mut row()).unwrap().get_str("first_name"),
            Some("transform_success")
        );
    }

    #[test]
    fn test_unknown_names_fail_at_build() {
        let mut b = RowMapBuilder::new();
        b.field("a").map_named("missing");
        assert!(matches!(b.build(), Err(MapError::UnresolvedTransform { .. })));

        let mut b = RowMapBuilder::new();
        b.after_row(["nope"]);
        assert!(matches!(b.build(), Err(MapError::UnresolvedHook(name)) if name == "nope"));
    }

    #[test]
    fn test_duplicate_fields() {
        let mut b = RowMapBuilder::new();
        b.field("a");
        b.field("a");
        let map = b.build().unwrap();
        assert_eq!(map.schema().len(), 1);
        assert_eq!(map.parse(&mut row()).unwrap().get_str("a"), Some("last_name"));

        let mut b = RowMapBuilder::new();
        b.on_duplicate(DuplicatePolicy::Reject);
        b.field("a");
        b.field("a");
        assert!(matches!(b.build(), Err(MapError::DuplicateField(name)) if name == "a"));
    }

    #[test]
    fn test_shadowed_field_logs_warning() {
        let mut logs = LOG_BROADCASTER.subscribe();

        let mut b = RowMapBuilder::new();
        b.field("shadowed");
        b.field("shadowed");
        b.build().unwrap();

        let entries = crate::logs::drain(&mut logs);
        assert!(entries.iter().any(|e| {
            e.level == crate::logs::LogLevel::Warning && e.field.as_deref() == Some("shadowed")
        }));
    }

    #[test]
    fn test_out_of_range_propagates() {
        let mut b = RowMapBuilder::new();
        b.fields(["a", "b", "c"]);
        let map = b.build().unwrap();
        assert!(matches!(
            map.parse(&mut row()),
            Err(MapError::IndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn test_parse_is_repeatable() {
        let mut b = RowMapBuilder::new();
        b.fields(["a", "b"]);
        let map = b.build().unwrap();
        assert_eq!(map.parse(&mut row()).unwrap(), map.parse(&mut row()).unwrap());
    }

    #[test]
    fn test_read_attributes_from_header() {
        let mut source = CsvSource::from_string("First Name, Last Name ,files+\nAda,Lovelace,3\n", ParserOptions::default());
        let mut aliases = HashMap::new();
        aliases.insert("files+".to_string(), "files_plus".to_string());

        let mut b = RowMapBuilder::new();
        b.read_attributes_from(&mut source, &aliases).unwrap();
        assert_eq!(b.cursor(), 0);
        assert_eq!(b.rows().start, 1);

        let names: Vec<&str> = b.attributes().iter().map(|a| a.name()).collect();
        assert_eq!(names, ["first_name", "last_name", "files_plus"]);

        // rewound: the header is the next row again
        assert_eq!(source.read_row().unwrap().unwrap()[0], "First Name");
    }

    #[test]
    fn test_read_attributes_keeps_later_start() {
        let mut source = CsvSource::from_string("a\n1\n", ParserOptions::default());
        let mut b = RowMapBuilder::new();
        b.start_at_row(4);
        b.read_attributes_from(&mut source, &HashMap::new()).unwrap();
        assert_eq!(b.rows().start, 4);
    }

    #[test]
    fn test_read_attributes_from_empty_source() {
        let mut source = CsvSource::from_string("", ParserOptions::default());
        let mut b = RowMapBuilder::new();
        let err = b.read_attributes_from(&mut source, &HashMap::new()).unwrap_err();
        assert!(matches!(err, MapError::Header(CsvError::NoHeaders)));
    }

    #[test]
    fn test_row_map_is_shareable() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<RowMap<Record>>();
    }
}
