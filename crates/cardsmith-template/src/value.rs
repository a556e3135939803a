use cardsmith_record::Record;

/// A runtime value flowing through directive evaluation.
///
/// `Absent` is the result of a path step that found nothing; it absorbs
/// every further step, so `@Data.Missing.text()` evaluates to `Absent`
/// rather than failing mid-path. Writing `Absent` produces no output.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Absent,
    Text(String),
    Number(f64),
    Bool(bool),
    Node(Record),
    Nodes(Vec<Record>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Absent => "absent",
            Value::Text(_) => "text",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Node(_) => "node",
            Value::Nodes(_) => "node sequence",
        }
    }

    /// Truthiness for `@if` and `!`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Absent => false,
            Value::Text(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0,
            Value::Bool(b) => *b,
            Value::Node(_) => true,
            Value::Nodes(v) => !v.is_empty(),
        }
    }

    /// The text this value contributes to template output. A node writes
    /// its text content; a node sequence has no single text form and must
    /// be indexed or iterated instead.
    pub fn render(&self) -> Result<String, String> {
        match self {
            Value::Absent => Ok(String::new()),
            Value::Text(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Node(r) => Ok(r.text()),
            Value::Nodes(_) => {
                Err("cannot write a node sequence; index it or iterate with @for".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsmith_record::parse_record;

    #[test]
    fn truthiness() {
        assert!(!Value::Absent.truthy());
        assert!(!Value::Text(String::new()).truthy());
        assert!(Value::Text("x".into()).truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(Value::Number(-1.0).truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Nodes(vec![]).truthy());
        assert!(Value::Nodes(vec![parse_record("<N/>").unwrap()]).truthy());
    }

    #[test]
    fn render_forms() {
        assert_eq!(Value::Absent.render().unwrap(), "");
        assert_eq!(Value::Number(3.0).render().unwrap(), "3");
        assert_eq!(Value::Number(1.5).render().unwrap(), "1.5");
        assert_eq!(Value::Bool(true).render().unwrap(), "true");
        let r = parse_record("<A>hi <B>there</B></A>").unwrap();
        assert_eq!(Value::Node(r).render().unwrap(), "hi ");
        assert!(Value::Nodes(vec![]).render().is_err());
    }
}
