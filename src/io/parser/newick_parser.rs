use crate::io::error::IoError;
use crate::tree::{FamilyTree, FixedNode};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug)]
pub struct NewickParser<'a> {
    last_token: Option<char>,
    reader: Peekable<Chars<'a>>,
    last_deliminator: char,
}

type Result<T> = std::result::Result<T, IoError>;

/*
This is modeled after the newick importer in BEAST. Comments in square
brackets are skipped, quoted labels may contain delimiters and doubled quotes.
 */
impl<'a> NewickParser<'a> {
    pub fn parse_string(input_string: &'a str) -> Result<FamilyTree> {
        let start = std::time::Instant::now();
        let mut parser = NewickParser {
            last_token: None,
            reader: input_string.chars().peekable(),
            last_deliminator: '\0',
        };

        parser.skip_until('(')?;
        parser.unread_token('(');

        let mut root = parser.read_internal_node()?;
        if parser.last_deliminator == ':' {
            root.length = Some(parser.read_double(",():;")?);
        }

        match parser.last_deliminator {
            ';' => {
                trace!("Tree parsed in {} milli seconds ", start.elapsed().as_millis());
                FamilyTree::from_fixed_node(root)
            }
            ')' => Err(IoError::Format("unbalanced ')' in tree".to_string())),
            c => Err(IoError::Format(format!(
                "expected ';' at the end of the tree but found '{}'",
                c
            ))),
        }
    }

    fn read_internal_node(&mut self) -> Result<FixedNode> {
        let token = self.read_token()?;
        if token != '(' {
            return Err(IoError::Format(format!("expected '(' but found '{}'", token)));
        }
        let mut node = FixedNode::new();
        node.children.push(self.read_branch()?);

        // read subsequent children
        while self.last_deliminator == ',' {
            node.children.push(self.read_branch()?);
        }

        // should have had a closing ')'
        if self.last_deliminator != ')' {
            return Err(IoError::Format("missing closing ')' in tree".to_string()));
        }
        let label = self.read_to_token(",:();")?;
        if !label.is_empty() {
            node.label = Some(label);
        }
        Ok(node)
    }

    fn read_external_node(&mut self) -> Result<FixedNode> {
        let label = self.read_to_token(",:();")?;
        if label.is_empty() {
            return Err(IoError::Format("found a tip without a name".to_string()));
        }
        Ok(FixedNode::tip(label))
    }

    fn read_branch(&mut self) -> Result<FixedNode> {
        let mut branch = if self.next_token()? == '(' {
            // is an internal node
            self.read_internal_node()?
        } else {
            // is an external node
            self.read_external_node()?
        };

        if self.last_deliminator == ':' {
            branch.length = Some(self.read_double(",():;")?);
        }
        Ok(branch)
    }

    fn unread_token(&mut self, c: char) {
        self.last_token = Some(c);
    }

    fn next_token(&mut self) -> Result<char> {
        match self.last_token {
            None => {
                let c = self.read_token()?;
                self.last_token = Some(c);
                Ok(c)
            }
            Some(c) => Ok(c),
        }
    }

    fn read_token(&mut self) -> Result<char> {
        self.skip_space()?;
        let mut ch = self.read()?;
        while ch == '[' {
            self.skip_comment()?;
            self.skip_space()?;
            ch = self.read()?;
        }
        Ok(ch)
    }

    fn read_to_token(&mut self, deliminator: &str) -> Result<String> {
        let mut token = String::new();
        let mut quote_char: Option<char> = None;
        let mut first = true;

        self.skip_space()?;
        loop {
            let ch = self.read()?;
            if let Some(q) = quote_char {
                if ch == q {
                    if self.peek() == Some(q) {
                        self.read()?;
                        token.push(q);
                    } else {
                        quote_char = None;
                    }
                } else {
                    token.push(ch);
                }
            } else if first && (ch == '\'' || ch == '"') {
                quote_char = Some(ch);
            } else if ch == '[' {
                self.skip_comment()?;
            } else if ch.is_whitespace() {
                let next = self.read_token()?;
                if deliminator.contains(next) {
                    self.last_deliminator = next;
                    return Ok(token);
                }
                return Err(IoError::Format(format!(
                    "unexpected '{}' after '{}'",
                    next, token
                )));
            } else if deliminator.contains(ch) {
                self.last_deliminator = ch;
                return Ok(token);
            } else {
                token.push(ch);
            }
            first = false;
        }
    }

    fn read_double(&mut self, deliminator: &str) -> Result<f64> {
        let s = self.read_to_token(deliminator)?;
        s.parse()
            .map_err(|_| IoError::Format(format!("could not parse branch length '{}'", s)))
    }

    fn peek(&mut self) -> Option<char> {
        match self.last_token {
            Some(c) => Some(c),
            None => self.reader.peek().copied(),
        }
    }

    fn read(&mut self) -> Result<char> {
        match self.last_token.take() {
            Some(c) => Ok(c),
            None => self.reader.next().ok_or(IoError::Eof),
        }
    }

    fn skip_space(&mut self) -> Result<()> {
        let mut ch = self.read()?;
        while ch.is_whitespace() {
            ch = self.read()?;
        }
        self.unread_token(ch);
        Ok(())
    }

    fn skip_comment(&mut self) -> Result<()> {
        while self.read()? != ']' {}
        Ok(())
    }

    fn skip_until(&mut self, c: char) -> Result<char> {
        let mut ch = self.read_token()?;
        while ch != c {
            ch = self.read_token()?;
        }
        Ok(ch)
    }
}

#[cfg(test)]
mod tests {
    use crate::io::parser::newick_parser::NewickParser;

    #[test]
    fn general_parse() {
        let tree = NewickParser::parse_string("(a:1,b:4)l;").unwrap();
        let root = tree.get_root();
        assert_eq!(tree.get_label(root), Some("l"));
        let names: Vec<&str> = tree
            .get_children(root)
            .iter()
            .filter_map(|child| tree.get_taxon(*child))
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let bl: Vec<f64> = tree
            .get_children(root)
            .iter()
            .filter_map(|child| tree.get_length(*child))
            .collect();
        assert_eq!(bl, vec![1.0, 4.0]);
    }

    #[test]
    fn scientific() {
        let tree = NewickParser::parse_string("(a:1E1,b:2e-5)l;").unwrap();
        let root = tree.get_root();
        let bl: Vec<f64> = tree
            .get_children(root)
            .iter()
            .filter_map(|child| tree.get_length(*child))
            .collect();
        assert_eq!(bl, vec![10.0, 0.00002]);
    }

    #[test]
    fn quoted() {
        let tree = NewickParser::parse_string("('234] ':1,'here a *':1);").unwrap();
        assert_eq!(tree.get_taxon(0), Some("234] "));
        assert_eq!(tree.get_taxon(2), Some("here a *"));
    }

    #[test]
    fn doubled_quote() {
        let tree = NewickParser::parse_string("('Wilson''s':1,b:1);").unwrap();
        assert_eq!(tree.get_taxon(0), Some("Wilson's"));
    }

    #[test]
    fn comment() {
        assert!(NewickParser::parse_string("(a[&test=ok],b:1);").is_ok());
    }

    #[test]
    fn whitespace() {
        assert!(NewickParser::parse_string("  (a , b:1);\t").is_ok());
    }

    #[test]
    fn root_length() {
        let tree = NewickParser::parse_string("(a:1,b:1):0.5;").unwrap();
        assert_eq!(tree.get_length(tree.get_root()), Some(0.5));
    }

    #[test]
    fn should_error() {
        let out = NewickParser::parse_string("('234] ','here a *')");
        assert!(out.is_err())
    }

    #[test]
    fn should_error_again() {
        let out = NewickParser::parse_string("(a,b));");
        assert!(out.is_err())
    }
}
