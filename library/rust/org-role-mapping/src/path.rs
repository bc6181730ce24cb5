//! パス評価器: userinfo JSON に対してクエリを評価し、該当する値の列を返す。
//!
//! JMESPath とドット区切りパスの 2 方言をサポートする。評価は呼び出しごとに
//! 独立しており、コンパイル結果を含め呼び出し間で状態を共有しない。

use serde::Deserialize;
use serde_json::Value;

/// クエリ方言。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathDialect {
    /// JMESPath 互換の式。
    #[default]
    JmesPath,
    /// `info.roles` のようなドット区切りパス。数値セグメントは配列の添字として扱う。
    Dotted,
}

/// PathError はクエリの構文・評価エラーを表す。
///
/// `message` には方言側の診断メッセージをそのまま保持する。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("{message}")]
    Syntax { query: String, message: String },

    #[error("{message}")]
    Evaluation { query: String, message: String },
}

impl PathError {
    /// エラーの原因となったクエリ文字列を返す。
    pub fn query(&self) -> &str {
        match self {
            PathError::Syntax { query, .. } | PathError::Evaluation { query, .. } => query,
        }
    }
}

/// `document` に対して `query` を評価する。
///
/// 結果は平坦化される: `null` は空、配列はその要素、それ以外は 1 要素。
/// 何もマッチしない場合はエラーではなく空の列を返す。
pub fn evaluate(dialect: PathDialect, query: &str, document: &Value) -> Result<Vec<Value>, PathError> {
    let found = match dialect {
        PathDialect::JmesPath => search_jmespath(query, document)?,
        PathDialect::Dotted => search_dotted(query, document)?,
    };

    Ok(match found {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    })
}

fn search_jmespath(query: &str, document: &Value) -> Result<Value, PathError> {
    let expr = jmespath::compile(query).map_err(|e| PathError::Syntax {
        query: query.to_string(),
        message: e.to_string().trim_end().to_string(),
    })?;

    let found = expr.search(document).map_err(|e| PathError::Evaluation {
        query: query.to_string(),
        message: e.to_string().trim_end().to_string(),
    })?;

    // jmespath の Variable は Rc ベースのため、ここで serde_json::Value に戻す
    serde_json::to_value(&*found).map_err(|e| PathError::Evaluation {
        query: query.to_string(),
        message: e.to_string(),
    })
}

fn search_dotted(query: &str, document: &Value) -> Result<Value, PathError> {
    if query.is_empty() {
        return Err(PathError::Syntax {
            query: query.to_string(),
            message: "SyntaxError: empty path".to_string(),
        });
    }
    if query.split('.').any(str::is_empty) {
        return Err(PathError::Syntax {
            query: query.to_string(),
            message: format!("SyntaxError: empty segment in path {query:?}"),
        });
    }

    let mut current = document;
    for segment in query.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Ok(Value::Null),
        }
    }

    Ok(current.clone())
}
