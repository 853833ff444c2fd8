//! Sentence tokenization is a pluggable external collaborator; this crate ships one conservative
//! default sufficient to exercise the rest of the pipeline.

pub trait Tokenizer {
    fn tokenize(&self, sentence: &str) -> Vec<String>;
}

/// Splits on whitespace, then strips any leading/trailing ASCII punctuation from each piece,
/// dropping pieces that become empty. Good enough for the toy grammars and CLI smoke-tests this
/// crate exercises; a caller needing full Penn-Treebank-style tokenization should supply their
/// own `Tokenizer`.
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, sentence: &str) -> Vec<String> {
        sentence
            .split_whitespace()
            .map(|word| word.trim_matches(|c: char| c.is_ascii_punctuation()))
            .filter(|word| !word.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_strips_punctuation() {
        let tokenizer = WhitespaceTokenizer;
        assert_eq!(
            tokenizer.tokenize("Peter sees a squirrel."),
            vec!["Peter", "sees", "a", "squirrel"]
        );
    }

    #[test]
    fn drops_bare_punctuation_tokens() {
        let tokenizer = WhitespaceTokenizer;
        assert_eq!(tokenizer.tokenize("hello , world"), vec!["hello", "world"]);
    }
}
