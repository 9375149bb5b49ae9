//! 권한 규칙 정의
//!
//! `permissions` 테이블의 한 행, 그리고 정적 정책 문서(YAML)의 구조를 정의합니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// CRUD 작업 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    /// 모든 작업
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    /// 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(Error::UnknownAction {
                action: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 허용 컬럼 목록
///
/// `All`("*")은 규칙 저장 이후에 추가된 컬럼까지 포함합니다.
/// `Only`는 나열된 컬럼만 허용하며 새 컬럼은 자동으로 포함되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum AllowedFields {
    /// 모든 컬럼 (`["*"]`)
    All,

    /// 명시적 목록 (순서 보존, 중복 없음)
    Only(Vec<String>),
}

impl Default for AllowedFields {
    fn default() -> Self {
        AllowedFields::All
    }
}

impl AllowedFields {
    /// 와일드카드 여부
    pub fn is_all(&self) -> bool {
        matches!(self, AllowedFields::All)
    }

    /// 컬럼 허용 여부
    pub fn permits(&self, column: &str) -> bool {
        match self {
            AllowedFields::All => true,
            AllowedFields::Only(columns) => columns.iter().any(|c| c == column),
        }
    }

    /// 다른 목록과 합집합
    pub fn union(&mut self, other: &AllowedFields) {
        match (&mut *self, other) {
            (AllowedFields::All, _) => {}
            (_, AllowedFields::All) => *self = AllowedFields::All,
            (AllowedFields::Only(mine), AllowedFields::Only(theirs)) => {
                for column in theirs {
                    if !mine.contains(column) {
                        mine.push(column.clone());
                    }
                }
            }
        }
    }
}

impl From<Vec<String>> for AllowedFields {
    fn from(columns: Vec<String>) -> Self {
        if columns.iter().any(|c| c == "*") {
            return AllowedFields::All;
        }
        let mut unique: Vec<String> = Vec::with_capacity(columns.len());
        for column in columns {
            if !unique.contains(&column) {
                unique.push(column);
            }
        }
        AllowedFields::Only(unique)
    }
}

impl From<AllowedFields> for Vec<String> {
    fn from(value: AllowedFields) -> Self {
        match value {
            AllowedFields::All => vec!["*".to_string()],
            AllowedFields::Only(columns) => columns,
        }
    }
}

/// 행 필터 (column = literal 의 AND)
///
/// 비어 있으면 행 제한이 없습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldFilter(pub BTreeMap<String, Value>);

impl FieldFilter {
    /// 빈 필터
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// 비어있는지
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 조건 추가
    pub fn eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.0.insert(column.into(), value);
        self
    }

    /// 값 검증
    ///
    /// 값은 스칼라(문자열, 숫자, 불리언, null)만 허용합니다.
    pub fn validate(&self) -> Result<()> {
        for (column, value) in &self.0 {
            if matches!(value, Value::Array(_) | Value::Object(_)) {
                return Err(Error::PermissionParse {
                    message: format!("field_filter value for '{}' must be a scalar", column),
                });
            }
        }
        Ok(())
    }
}

/// 권한 규칙 (`permissions` 테이블의 한 행)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Role 식별자
    pub role: String,

    /// 대상 테이블 이름
    #[serde(rename = "table_name")]
    pub table: String,

    /// 작업
    pub action: Action,

    /// 행 필터
    #[serde(default)]
    pub field_filter: FieldFilter,

    /// 허용 컬럼
    #[serde(default)]
    pub allowed_fields: AllowedFields,
}

impl PermissionRule {
    /// 새 규칙 생성 (모든 컬럼, 행 제한 없음)
    pub fn new(role: impl Into<String>, table: impl Into<String>, action: Action) -> Self {
        Self {
            role: role.into(),
            table: table.into(),
            action,
            field_filter: FieldFilter::empty(),
            allowed_fields: AllowedFields::All,
        }
    }

    /// 행 필터 조건 추가
    pub fn filter(mut self, column: impl Into<String>, value: Value) -> Self {
        self.field_filter = self.field_filter.eq(column, value);
        self
    }

    /// 허용 컬럼 지정
    pub fn fields<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_fields =
            AllowedFields::from(columns.into_iter().map(Into::into).collect::<Vec<_>>());
        self
    }
}

/// 전체 정적 권한 정책
///
/// YAML 문서의 루트 구조입니다.
///
/// ```yaml
/// tables:
///   posts:
///     read:
///       - roles: [editor]
///         allowed_fields: ["*"]
///       - roles: [guest]
///         allowed_fields: [title]
///         field_filter: { status: published }
///     create:
///       roles: [editor]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PermissionPolicy {
    /// 테이블별 권한 정책
    #[serde(default)]
    pub tables: HashMap<String, TablePermissions>,
}

/// 정책 문서의 규칙 항목 (여러 role에 같은 조건 적용)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEntry {
    /// 적용되는 role 목록
    pub roles: Vec<String>,

    /// 행 필터
    #[serde(default)]
    pub field_filter: FieldFilter,

    /// 허용 컬럼
    #[serde(default)]
    pub allowed_fields: AllowedFields,
}

/// Action별 규칙 목록
#[derive(Debug, Clone, Serialize)]
pub struct OperationRules {
    pub rules: Vec<PolicyEntry>,
}

/// OperationRules의 custom deserializer (단일 항목 shorthand 허용)
impl<'de> Deserialize<'de> for OperationRules {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};

        struct OperationRulesVisitor;

        impl<'de> Visitor<'de> for OperationRulesVisitor {
            type Value = OperationRules;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a sequence of policy entries or a single policy entry object")
            }

            fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut rules = Vec::new();
                while let Some(rule) = seq.next_element::<PolicyEntry>()? {
                    rules.push(rule);
                }
                Ok(OperationRules { rules })
            }

            fn visit_map<M>(self, map: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: de::MapAccess<'de>,
            {
                let rule = PolicyEntry::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(OperationRules { rules: vec![rule] })
            }
        }

        deserializer.deserialize_any(OperationRulesVisitor)
    }
}

/// 테이블 권한 정책
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablePermissions {
    #[serde(default)]
    pub create: Option<OperationRules>,

    #[serde(default)]
    pub read: Option<OperationRules>,

    #[serde(default)]
    pub update: Option<OperationRules>,

    #[serde(default)]
    pub delete: Option<OperationRules>,
}

impl TablePermissions {
    /// 특정 작업의 규칙 목록 가져오기
    pub fn get_action(&self, action: Action) -> Option<&OperationRules> {
        match action {
            Action::Create => self.create.as_ref(),
            Action::Read => self.read.as_ref(),
            Action::Update => self.update.as_ref(),
            Action::Delete => self.delete.as_ref(),
        }
    }
}

impl PermissionPolicy {
    /// YAML 문서 파싱 및 검증
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let policy: PermissionPolicy = serde_yaml::from_str(yaml)?;
        for rule in policy.rules() {
            rule.field_filter.validate()?;
        }
        Ok(policy)
    }

    /// 특정 테이블/작업의 규칙을 role별 규칙으로 펼치기
    pub fn rules_for(&self, table: &str, action: Action) -> Vec<PermissionRule> {
        let Some(entries) = self
            .tables
            .get(table)
            .and_then(|perms| perms.get_action(action))
        else {
            return Vec::new();
        };

        entries
            .rules
            .iter()
            .flat_map(|entry| {
                entry.roles.iter().map(move |role| PermissionRule {
                    role: role.clone(),
                    table: table.to_string(),
                    action,
                    field_filter: entry.field_filter.clone(),
                    allowed_fields: entry.allowed_fields.clone(),
                })
            })
            .collect()
    }

    /// 문서 전체를 규칙 목록으로 펼치기
    pub fn rules(&self) -> Vec<PermissionRule> {
        self.tables
            .keys()
            .flat_map(|table| {
                Action::ALL
                    .into_iter()
                    .flat_map(move |action| self.rules_for(table, action))
            })
            .collect()
    }
}
