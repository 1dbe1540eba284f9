//! Cross-cutting parser properties: spans, word round-trips, reprinting,
//! robustness against arbitrary input, and end-to-end scenarios.

use proptest::prelude::*;
use shsyntax::{
    parse, parse_str, walk, CommandNode, Node, NodeRef, ParseError, ParseOptions, Pos,
    ScriptNode, WordNode, WordPart,
};

const BASH: ParseOptions = ParseOptions {
    posix: false,
    keep_comments: false,
};

const POSIX: ParseOptions = ParseOptions {
    posix: true,
    keep_comments: false,
};

const SCRIPTS: &[&str] = &[
    "echo hello world",
    "a=1 b+=2 cmd >out 2>&1 <in arg",
    "x | y |& z && w || v; u &",
    "! cmd; other",
    "if a; then b; elif c; then d; else e; fi",
    "while read -r l; do echo \"$l\"; done <file",
    "until false; do :; done",
    "for i in 1 2 3; do echo $i; done",
    "for ((i = 0; i < 3; i++)); do echo $i; done",
    "case $x in a | b) one ;; (c) two ;& *) three ;;& esac",
    "{ a; b; } >log",
    "(cd dir && make) || exit 1",
    "f() { echo \"$@\"; }",
    "function g { return 0; }",
    "echo ${x:-default} ${#y} ${!z} ${arr[1]} ${s:1:2} ${p//a/b} ${u^^}",
    "echo $((1 + 2 * 3)) $[4 ** 2] $((a ? b : c))",
    "((i += 2, j--))",
    "[[ -f $file && ( $a == b* || ! -z $c ) ]]",
    "[[ $line =~ ^(a|b)+[0-9]$ ]]",
    "declare -a arr=(1 2 3) local_x; local y=2",
    "export PATH=$PATH:/bin; readonly R",
    "eval echo hi; let 'a = 1' b++",
    "coproc NAME { cat; }",
    "diff <(sort a) >(tee b) @(x|y) *(z)",
    "echo `date` $(uname -a) 'single' $'ansi\\n' $\"locale\"",
    "cat <<<\"here string\"",
    "cat <<EOF\nhello $name\nEOF\necho done",
    "cat <<-'EOF' | wc -l\n\tliteral\n\tEOF\n",
    "x=$(cat <<EOF\ninner\nEOF\n)",
    "echo a # trailing comment\n# own line\necho b",
];

fn bash(src: &str) -> ScriptNode {
    let result = parse_str(src, BASH);
    assert!(result.is_ok(), "{:?}: {:?}", src, result.err());
    result.unwrap()
}

fn slice(src: &str, node: &impl Node) -> String {
    src[node.pos().offset()..node.end().offset()].to_string()
}

/// Kind tags and child counts, without positions.
fn shape(node: NodeRef<'_>) -> String {
    let children: Vec<String> = node.children().into_iter().map(shape).collect();
    if children.is_empty() {
        node.kind().to_string()
    } else {
        format!("{}({})", node.kind(), children.join(" "))
    }
}

fn check_spans(node: NodeRef<'_>, src: &str) {
    let (pos, end) = (node.pos(), node.end());
    if !pos.is_valid() || !end.is_valid() {
        return;
    }
    assert!(pos <= end, "{} in {:?}: {} > {}", node.kind(), src, pos, end);
    assert!(end.offset() <= src.len(), "{} ends past input", node.kind());
    for child in node.spanned_children() {
        if child.pos().is_valid() && child.end().is_valid() {
            assert!(
                pos <= child.pos() && child.end() <= end,
                "{} [{}, {}) escapes {} [{}, {}) in {:?}",
                child.kind(),
                child.pos(),
                child.end(),
                node.kind(),
                pos,
                end,
                src
            );
        }
        check_spans(child, src);
    }
}

fn simple_args(script: &ScriptNode) -> Vec<&WordNode> {
    let mut out = Vec::new();
    walk(NodeRef::Script(script), &mut |n| {
        if let NodeRef::Command(CommandNode::Simple(call)) = n {
            out.extend(call.args.iter());
        }
        true
    });
    out
}

// =============================================================================
// SPANS
// =============================================================================

#[test]
fn test_spans_are_nested() {
    for src in SCRIPTS {
        let script = bash(src);
        check_spans(NodeRef::Script(&script), src);
    }
}

#[test]
fn test_spans_with_comments() {
    let src = "# head\na; b # tail\n";
    let options = ParseOptions {
        keep_comments: true,
        ..BASH
    };
    let script = parse_str(src, options).unwrap();
    assert_eq!(script.comments.len(), 2);
    assert_eq!(script.comments[0].text, " head");
    assert_eq!(script.pos(), Pos::at_offset(0));
    check_spans(NodeRef::Script(&script), src);
}

// =============================================================================
// WORD ROUND-TRIP
// =============================================================================

#[test]
fn test_word_slices_reparse_to_same_parts() {
    for src in SCRIPTS {
        if src.contains("<<") {
            continue;
        }
        let script = bash(src);
        for word in simple_args(&script) {
            let text = slice(src, word);
            let again = bash(&format!("echo {}", text));
            let reparsed = simple_args(&again)[1];
            assert_eq!(reparsed.parts.len(), word.parts.len(), "{:?}", text);
            for (a, b) in word.parts.iter().zip(&reparsed.parts) {
                assert_eq!(
                    shape(NodeRef::WordPart(a)),
                    shape(NodeRef::WordPart(b)),
                    "{:?}",
                    text
                );
                assert_eq!(a.pos().offset() - word.pos().offset(), b.pos().offset() - 5);
                assert_eq!(a.end().offset() - word.pos().offset(), b.end().offset() - 5);
            }
        }
    }
}

// =============================================================================
// REPRINT
// =============================================================================

#[test]
fn test_reprinted_statements_keep_shape() {
    for src in SCRIPTS {
        if src.contains("<<") && !src.contains("<<<") {
            continue;
        }
        let script = bash(src);
        let printed: Vec<String> = script.statements.iter().map(|s| slice(src, s)).collect();
        let printed = printed.join("\n\n");
        let again = bash(&printed);
        assert_eq!(
            shape(NodeRef::Script(&script)),
            shape(NodeRef::Script(&again)),
            "{:?} reprinted as {:?}",
            src,
            printed
        );
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn test_heredoc_scenario() {
    let script = bash("cat <<EOF\nhello\nEOF\n");
    assert_eq!(script.statements.len(), 1);
    let redirect = &script.statements[0].redirections[0];
    let body = redirect.heredoc.as_ref().expect("Expected heredoc body");
    assert_eq!(body.lit(), Some("hello\n"));

    let script = bash("cat <<EOF\nhello\nEOF\necho after");
    assert_eq!(script.statements.len(), 2);
    assert_eq!(script.statements[1].pos(), Pos::at_offset(20));
}

#[test]
fn test_quoting_scenario() {
    let script = bash("echo \"a$b\"");
    let word = simple_args(&script)[1];
    let [WordPart::DoubleQuoted(dq)] = word.parts.as_slice() else {
        panic!("Expected one double-quoted part");
    };
    let [WordPart::Literal(lit), WordPart::ParameterExpansion(pe)] = dq.parts.as_slice() else {
        panic!("Expected literal then parameter expansion");
    };
    assert_eq!(lit.value, "a");
    assert_eq!(pe.param.value, "b");
}

#[test]
fn test_c_style_for_gating() {
    let src = "for ((i=0;i<3;i++)); do echo $i; done";
    assert!(parse_str(src, BASH).is_ok());
    let err = parse_str(src, POSIX).unwrap_err();
    assert!(matches!(err, ParseError::Syntax(_) | ParseError::Lexical(_)));
}

#[test]
fn test_position_resolution() {
    let script = bash("foo\nbar");
    let b = script.statements[1].pos();
    assert_eq!(b, Pos::at_offset(4));
    let position = script.position(b);
    assert_eq!((position.line, position.column), (2, 1));
    let first = script.position(Pos::at_offset(0));
    assert_eq!((first.line, first.column), (1, 1));
}

#[test]
fn test_unterminated_double_quote() {
    let err = parse_str("echo \"abc", BASH).unwrap_err();
    let ParseError::Lexical(diag) = &err else {
        panic!("Expected lexical error, got {:?}", err);
    };
    assert_eq!(diag.pos, Pos::at_offset(5));
    assert_eq!((diag.position.line, diag.position.column), (1, 6));
}

#[test]
fn test_diagnostic_format() {
    let err = parse("echo hi\nif x\n".as_bytes(), "deploy.sh", BASH).unwrap_err();
    let text = err.to_string();
    assert!(text.starts_with("deploy.sh:"), "{}", text);
    let err = parse_str("echo \"abc", BASH).unwrap_err();
    assert_eq!(err.to_string(), "1:6: reached EOF without closing quote \"");
}

#[test]
fn test_invalid_utf8_is_encoding_error() {
    let err = parse(&b"echo \xff\xfe"[..], "", BASH).unwrap_err();
    assert!(matches!(err, ParseError::Encoding(_)), "{:?}", err);
}

#[test]
fn test_posix_rejects_bash_syntax() {
    for src in [
        "echo <(ls)",
        "a=(1 2)",
        "cat <<<word",
        "a |& b",
        "echo ${a[1]}",
    ] {
        assert!(parse_str(src, BASH).is_ok(), "{:?}", src);
        assert!(parse_str(src, POSIX).is_err(), "{:?}", src);
    }
}

#[test]
fn test_ast_serializes() {
    let script = bash("echo \"a$b\" | wc -l");
    let json = serde_json::to_value(&script).unwrap();
    assert_eq!(json["statements"].as_array().map(Vec::len), Some(1));
    assert!(serde_yaml::to_string(&script).is_ok());
}

// =============================================================================
// ROBUSTNESS
// =============================================================================

proptest! {
    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = parse(bytes.as_slice(), "", BASH);
        let _ = parse(bytes.as_slice(), "", POSIX);
    }

    #[test]
    fn prop_arbitrary_text_never_panics(src in "\\PC{0,128}") {
        let _ = parse_str(&src, BASH);
        let _ = parse_str(&src, POSIX);
    }

    #[test]
    fn prop_shell_like_text_never_panics(
        src in "[a-z0-9 \\n\\t;|&<>(){}\\[\\]$`'\"\\\\#=!*?@+:%^,/~-]{0,96}"
    ) {
        let _ = parse_str(&src, BASH);
        let _ = parse_str(&src, POSIX);
    }

    #[test]
    fn prop_parsed_shell_like_text_has_nested_spans(
        src in "[a-z $;|&(){}\"'=]{0,48}"
    ) {
        if let Ok(script) = parse_str(&src, BASH) {
            check_spans(NodeRef::Script(&script), &src);
        }
    }
}
