use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expression description is empty")]
pub struct EmptyInputError;

/// 去除首尾空白后原样返回，空描述无法构成提示词
pub fn normalize(text: &str) -> Result<String, EmptyInputError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EmptyInputError);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_rejected() {
        assert_eq!(normalize(""), Err(EmptyInputError));
        assert_eq!(normalize("   "), Err(EmptyInputError));
        assert_eq!(normalize("\n\t "), Err(EmptyInputError));
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        assert_eq!(normalize("  droopy eyes ").as_deref(), Ok("droopy eyes"));
    }

    #[test]
    fn test_inner_text_untouched() {
        let text = "tense mouth,  lowered head\nears pinned back";
        assert_eq!(normalize(text).as_deref(), Ok(text));
    }
}
