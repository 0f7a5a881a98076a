use std::collections::VecDeque;

use crate::{
    error::{Error, Result},
    value::{Lua, LuaFunction, LuaString, LuaTable, LuaUserData, Value},
};

/// Arguments or return values of a call.
///
/// Values are consumed front to back, so [`MultiValue::pop_front`] yields the first argument.
#[derive(Debug, Clone, Default)]
pub struct MultiValue(VecDeque<Value>);

impl MultiValue {
    pub fn new() -> Self {
        Self(VecDeque::new())
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self(VecDeque::with_capacity(cap))
    }

    /// Builds a multi-value for `lua`, refusing closed objects or objects owned by another VM.
    pub fn from_values(lua: &Lua, values: Vec<Value>) -> Result<Self> {
        for value in &values {
            if value.is_closed() {
                return Err(Error::ClosedObject);
            }

            if let Some(owner) = value.lua() {
                if !owner.same_vm(lua) {
                    return Err(Error::ForeignVm(value.type_of().name()));
                }
            }
        }

        Ok(Self(values.into()))
    }

    #[inline]
    pub fn push_back(&mut self, value: impl Into<Value>) {
        self.0.push_back(value.into());
    }

    #[inline]
    pub fn pop_front(&mut self) -> Option<Value> {
        self.0.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0.into()
    }

    /// Closes every value, reporting all failures together.
    ///
    /// A single failure is returned as is, several come back as [`Error::CloseMany`].
    pub fn close(&self) -> Result<()> {
        let mut errors: Vec<Error> = self.0.iter().filter_map(|v| v.close().err()).collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::CloseMany(errors)),
        }
    }

    /// The value at `index`, errors if there are not enough values.
    pub fn value_at(&self, index: usize) -> Result<&Value> {
        self.0.get(index).ok_or(Error::MissingValue {
            expected: index + 1,
            got: self.0.len(),
        })
    }

    fn mismatch(&self, index: usize, expected: &'static str, got: &Value) -> Error {
        Error::TypeMismatch {
            index: index + 1,
            expected,
            got: got.type_of().name(),
        }
    }

    pub fn bool_at(&self, index: usize) -> Result<bool> {
        match self.value_at(index)? {
            Value::Boolean(b) => Ok(*b),
            other => Err(self.mismatch(index, "boolean", other)),
        }
    }

    /// Integers as-is, numbers truncated toward zero.
    pub fn integer_at(&self, index: usize) -> Result<i64> {
        match self.value_at(index)? {
            Value::Integer(i) => Ok(*i),
            Value::Number(n) => Ok(*n as i64),
            other => Err(self.mismatch(index, "integer", other)),
        }
    }

    pub fn number_at(&self, index: usize) -> Result<f64> {
        match self.value_at(index)? {
            Value::Number(n) => Ok(*n),
            Value::Integer(i) => Ok(*i as f64),
            other => Err(self.mismatch(index, "number", other)),
        }
    }

    pub fn string_at(&self, index: usize) -> Result<LuaString> {
        match self.value_at(index)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.mismatch(index, "string", other)),
        }
    }

    pub fn table_at(&self, index: usize) -> Result<LuaTable> {
        match self.value_at(index)? {
            Value::Table(t) => Ok(t.clone()),
            other => Err(self.mismatch(index, "table", other)),
        }
    }

    pub fn function_at(&self, index: usize) -> Result<LuaFunction> {
        match self.value_at(index)? {
            Value::Function(f) => Ok(f.clone()),
            other => Err(self.mismatch(index, "function", other)),
        }
    }

    pub fn userdata_at(&self, index: usize) -> Result<LuaUserData> {
        match self.value_at(index)? {
            Value::UserData(ud) => Ok(ud.clone()),
            other => Err(self.mismatch(index, "userdata", other)),
        }
    }
}

impl From<Vec<Value>> for MultiValue {
    fn from(values: Vec<Value>) -> Self {
        Self(values.into())
    }
}

impl IntoIterator for MultiValue {
    type Item = Value;
    type IntoIter = std::collections::vec_deque::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
