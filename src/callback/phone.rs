//! Phone number field with a locked country-code prefix.

/// Text field holding a phone number that always starts with
/// `"{country_code} "`.
///
/// ```
/// use voice_demo::callback::PhoneField;
///
/// let mut phone = PhoneField::new("+1");
/// assert_eq!(phone.value(), "+1 ");
/// assert!(phone.edit("+1 555 123 4567"));
/// assert!(!phone.edit("555 123 4567"));
/// assert_eq!(phone.value(), "+1 555 123 4567");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneField {
    prefix: String,
    value: String,
}

impl PhoneField {
    pub fn new(country_code: &str) -> Self {
        let prefix = format!("{} ", country_code.trim());
        Self {
            value: prefix.clone(),
            prefix,
        }
    }

    /// Replace the value with `candidate` if it keeps the prefix and has only
    /// digits and spaces after it.  Returns whether the edit was accepted.
    pub fn edit(&mut self, candidate: &str) -> bool {
        let Some(rest) = candidate.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        if !rest.chars().all(|c| c.is_ascii_digit() || c == ' ') {
            return false;
        }
        self.value.clear();
        self.value.push_str(candidate);
        true
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The part after the prefix.
    pub fn local_part(&self) -> &str {
        &self.value[self.prefix.len()..]
    }

    /// True once at least one digit follows the prefix.
    pub fn has_number(&self) -> bool {
        self.local_part().chars().any(|c| c.is_ascii_digit())
    }

    /// Back to just the prefix.
    pub fn clear(&mut self) {
        self.value.clone_from(&self.prefix);
    }
}
