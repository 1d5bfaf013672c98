use model::{
    core::value::Value,
    mapping::{AccessError, AccessorTable, ColumnPair},
};

/// Lazy, forward-only, single-pass row source over one batch. Each yielded
/// row carries field values in destination column order; nothing is copied
/// out of the batch until the row is read.
pub struct RowStream<'a, T> {
    records: std::slice::Iter<'a, T>,
    mapping: &'a AccessorTable<T>,
}

impl<'a, T> RowStream<'a, T> {
    pub fn new(records: &'a [T], mapping: &'a AccessorTable<T>) -> Self {
        Self {
            records: records.iter(),
            mapping,
        }
    }

    /// The (source field -> destination column) pairings, available before
    /// any row is read.
    pub fn column_pairs(&self) -> Vec<ColumnPair> {
        self.mapping.column_pairs()
    }
}

impl<T> Iterator for RowStream<'_, T> {
    type Item = Result<Vec<Value>, AccessError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        Some(self.mapping.read_row(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::mapping::ColumnBinding;

    struct Event {
        id: i64,
        kind: Option<String>,
    }

    fn mapping() -> AccessorTable<Event> {
        AccessorTable::new(vec![
            ColumnBinding::infallible("id", "event_id", |e: &Event| Value::Int(e.id)),
            ColumnBinding::new("kind", "event_kind", |e: &Event| {
                e.kind
                    .as_deref()
                    .map(Value::from)
                    .ok_or_else(|| AccessError::missing("kind"))
            }),
        ])
    }

    #[test]
    fn rows_come_out_in_batch_order_and_column_order() {
        let records = vec![
            Event {
                id: 1,
                kind: Some("a".into()),
            },
            Event {
                id: 2,
                kind: Some("b".into()),
            },
        ];
        let mapping = mapping();
        let rows: Vec<_> = RowStream::new(&records, &mapping)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::String("a".into())],
                vec![Value::Int(2), Value::String("b".into())],
            ]
        );
    }

    #[test]
    fn stream_is_single_pass_and_finite() {
        let records = vec![Event {
            id: 1,
            kind: Some("a".into()),
        }];
        let mapping = mapping();
        let mut stream = RowStream::new(&records, &mapping);

        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn malformed_record_surfaces_mid_stream() {
        let records = vec![
            Event {
                id: 1,
                kind: Some("a".into()),
            },
            Event { id: 2, kind: None },
        ];
        let mapping = mapping();
        let mut stream = RowStream::new(&records, &mapping);

        assert!(stream.next().unwrap().is_ok());
        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, AccessError::MissingField { field } if field == "kind"));
    }
}
