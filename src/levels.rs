use std::fs;
use std::path::Path;

use crate::board::Board;
use crate::error::Result;

/// A collection of Sokoban levels in XSB format.
#[derive(Debug, Clone)]
pub struct Levels {
    levels: Vec<Board>,
}

impl Levels {
    /// Parse XSB-formatted Sokoban levels from a string.
    ///
    /// The XSB format uses:
    /// - Lines starting with `;` as level separators/comments
    /// - Standard Sokoban characters (#, @, $, ., *, +, space)
    /// - Empty lines between levels (optional)
    pub fn from_text(contents: &str) -> Result<Self> {
        let mut levels = Vec::new();
        let mut current_level = String::new();

        for line in contents.lines() {
            // Comment lines and blank lines both end the level being read
            if line.trim_start().starts_with(';') || line.is_empty() {
                flush(&mut current_level, &mut levels)?;
                continue;
            }

            current_level.push_str(line);
            current_level.push('\n');
        }

        // Last level if the file doesn't end with an empty line
        flush(&mut current_level, &mut levels)?;

        Ok(Levels { levels })
    }

    /// Parse XSB-formatted Sokoban levels from a text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_text(&contents)
    }

    /// Get the nth level (0-indexed).
    pub fn get(&self, index: usize) -> Option<&Board> {
        self.levels.get(index)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Board> {
        self.levels.iter()
    }
}

fn flush(current_level: &mut String, levels: &mut Vec<Board>) -> Result<()> {
    if !current_level.is_empty() {
        // Remove trailing newline but preserve internal structure
        levels.push(Board::from_text(current_level.trim_end())?);
        current_level.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_from_text_basic() {
        let level1 = "####
# .#
#  ###
#*@  #
#  $ #
#  ###
####";

        let level2 = "######
#    #
# #@ #
# $* #
# .* #
#    #
######";

        let level3 = "  ####
###  ####
#     $ #
# #  #$ #
# . .#@ #
#########";

        let xsb_content = format!(
            "; 1\n\n{}\n\n; 2\n\n{}\n\n; 3\n\n{}\n",
            level1, level2, level3
        );

        let levels = Levels::from_text(&xsb_content).unwrap();

        assert_eq!(levels.len(), 3);

        // Verify levels match the original strings when formatted back
        assert_eq!(levels.get(0).unwrap().to_string().trim_end(), level1);
        assert_eq!(levels.get(1).unwrap().to_string().trim_end(), level2);
        assert_eq!(levels.get(2).unwrap().to_string().trim_end(), level3);
    }

    #[test]
    fn test_from_text_invalid_level() {
        let xsb_content = "; 1

####
# .#
#@@  #
####
";

        let result = Levels::from_text(xsb_content);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::InvalidLevel(_)));
    }

    #[test]
    fn test_comment_only_file_is_empty() {
        let levels = Levels::from_text("; nothing here\n;\n").unwrap();
        assert!(levels.is_empty());
    }

    #[test]
    fn test_unterminated_last_level() {
        let levels = Levels::from_text("; 1\n#####\n#@$.#\n#####").unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels.iter().next().unwrap().box_count(), 1);
    }

    #[test]
    fn test_from_file_no_file() {
        let result = Levels::from_file("nonexistent_file.xsb");
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::Io(_)));
    }
}
