//! Parameter store
//!
//! Hyperparameters are addressed by stable numeric attribute IDs so they can
//! be read and written in bulk (`get_options` / `set_options`). Integer-valued
//! attributes live strictly between [`LONG_ATTRIBUTE_MIN`] and
//! [`LONG_ATTRIBUTE_MAX`], float-valued ones strictly between
//! [`DOUBLE_ATTRIBUTE_MIN`] and [`DOUBLE_ATTRIBUTE_MAX`].

use crate::core::{KernelType, Parameters, Result, SVMError, SVMType};
use std::collections::BTreeMap;
use std::fmt;

pub const LONG_ATTRIBUTE_MIN: i64 = 100;
pub const LONG_ATTRIBUTE_MAX: i64 = 108;
pub const DOUBLE_ATTRIBUTE_MIN: i64 = 200;
pub const DOUBLE_ATTRIBUTE_MAX: i64 = 209;

/// Integer-valued attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LongAttribute {
    SVMType = 101,
    KernelType = 102,
    Degree = 103,
    Shrinking = 104,
    Probability = 105,
}

impl LongAttribute {
    pub const ALL: [LongAttribute; 5] = [
        LongAttribute::SVMType,
        LongAttribute::KernelType,
        LongAttribute::Degree,
        LongAttribute::Shrinking,
        LongAttribute::Probability,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }
}

/// Float-valued attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoubleAttribute {
    Gamma = 201,
    Nu = 202,
    Eps = 203,
    P = 204,
    Coef0 = 205,
    C = 206,
    CacheSize = 207,
}

impl DoubleAttribute {
    pub const ALL: [DoubleAttribute; 7] = [
        DoubleAttribute::Gamma,
        DoubleAttribute::Nu,
        DoubleAttribute::Eps,
        DoubleAttribute::P,
        DoubleAttribute::Coef0,
        DoubleAttribute::C,
        DoubleAttribute::CacheSize,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }
}

/// Value of one attribute in bulk get/set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionValue {
    Long(i64),
    Double(f64),
    Bool(bool),
}

impl OptionValue {
    fn as_long(self) -> i64 {
        match self {
            OptionValue::Long(v) => v,
            OptionValue::Double(v) => v as i64,
            OptionValue::Bool(v) => i64::from(v),
        }
    }

    fn as_double(self) -> f64 {
        match self {
            OptionValue::Long(v) => v as f64,
            OptionValue::Double(v) => v,
            OptionValue::Bool(v) => f64::from(u8::from(v)),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Long(v)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Double(v)
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Long(v) => write!(f, "{v}"),
            OptionValue::Double(v) => write!(f, "{v}"),
            OptionValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Validated, mutable set of training hyperparameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    params: Parameters,
}

impl ParameterStore {
    /// Store initialized with the solver defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an integer-valued attribute; `false` leaves the store unchanged.
    pub fn set_long(&mut self, attribute: i64, value: i64) -> bool {
        if attribute <= LONG_ATTRIBUTE_MIN || attribute >= LONG_ATTRIBUTE_MAX {
            return false;
        }
        let Some(attribute) = LongAttribute::from_id(attribute) else {
            return false;
        };

        match attribute {
            LongAttribute::SVMType => match SVMType::from_code(value) {
                Some(t) => self.params.svm_type = t,
                None => return false,
            },
            LongAttribute::KernelType => match KernelType::from_code(value) {
                Some(k) => self.params.kernel_type = k,
                None => return false,
            },
            LongAttribute::Degree => match i32::try_from(value) {
                Ok(d) => self.params.degree = d,
                Err(_) => return false,
            },
            LongAttribute::Shrinking => self.params.shrinking = value != 0,
            LongAttribute::Probability => self.params.probability = value != 0,
        }
        true
    }

    /// Set a float-valued attribute; `false` leaves the store unchanged.
    pub fn set_double(&mut self, attribute: i64, value: f64) -> bool {
        if attribute <= DOUBLE_ATTRIBUTE_MIN || attribute >= DOUBLE_ATTRIBUTE_MAX {
            return false;
        }
        let Some(attribute) = DoubleAttribute::from_id(attribute) else {
            return false;
        };

        let field = match attribute {
            DoubleAttribute::Gamma => &mut self.params.gamma,
            DoubleAttribute::Nu => &mut self.params.nu,
            DoubleAttribute::Eps => &mut self.params.eps,
            DoubleAttribute::P => &mut self.params.p,
            DoubleAttribute::Coef0 => &mut self.params.coef0,
            DoubleAttribute::C => &mut self.params.c,
            DoubleAttribute::CacheSize => &mut self.params.cache_size,
        };
        *field = value;
        true
    }

    /// Set a flag attribute (shrinking or probability)
    pub fn set_bool(&mut self, attribute: i64, value: bool) -> bool {
        match LongAttribute::from_id(attribute) {
            Some(LongAttribute::Shrinking) | Some(LongAttribute::Probability) => {
                self.set_long(attribute, i64::from(value))
            }
            _ => false,
        }
    }

    /// Current parameters, verbatim
    pub fn snapshot(&self) -> Parameters {
        self.params.clone()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Every attribute with its current value
    pub fn get_options(&self) -> BTreeMap<i64, OptionValue> {
        let p = &self.params;
        let mut options = BTreeMap::new();

        options.insert(LongAttribute::SVMType.id(), OptionValue::Long(p.svm_type.code()));
        options.insert(
            LongAttribute::KernelType.id(),
            OptionValue::Long(p.kernel_type.code()),
        );
        options.insert(LongAttribute::Degree.id(), OptionValue::Long(i64::from(p.degree)));
        options.insert(LongAttribute::Shrinking.id(), OptionValue::Bool(p.shrinking));
        options.insert(LongAttribute::Probability.id(), OptionValue::Bool(p.probability));

        options.insert(DoubleAttribute::Gamma.id(), OptionValue::Double(p.gamma));
        options.insert(DoubleAttribute::Nu.id(), OptionValue::Double(p.nu));
        options.insert(DoubleAttribute::Eps.id(), OptionValue::Double(p.eps));
        options.insert(DoubleAttribute::P.id(), OptionValue::Double(p.p));
        options.insert(DoubleAttribute::Coef0.id(), OptionValue::Double(p.coef0));
        options.insert(DoubleAttribute::C.id(), OptionValue::Double(p.c));
        options.insert(DoubleAttribute::CacheSize.id(), OptionValue::Double(p.cache_size));

        options
    }

    /// Apply many attributes at once.
    ///
    /// IDs outside both attribute ranges are ignored. Values are converted to
    /// the attribute's type. Entries before a rejected one stay applied.
    pub fn set_options<I>(&mut self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (i64, OptionValue)>,
    {
        for (id, value) in options {
            let applied = if id > LONG_ATTRIBUTE_MIN && id < LONG_ATTRIBUTE_MAX {
                self.set_long(id, value.as_long())
            } else if id > DOUBLE_ATTRIBUTE_MIN && id < DOUBLE_ATTRIBUTE_MAX {
                self.set_double(id, value.as_double())
            } else {
                log::debug!("Ignoring unknown option {id}");
                continue;
            };

            if !applied {
                return Err(SVMError::InvalidParameter(format!(
                    "failed to set the attribute {id} to {value}"
                )));
            }
        }
        Ok(())
    }
}

impl From<Parameters> for ParameterStore {
    fn from(params: Parameters) -> Self {
        Self { params }
    }
}
