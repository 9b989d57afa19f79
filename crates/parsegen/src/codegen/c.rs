//! C output.

use super::{Branch, Codegen, Render, Routine, Settings, Step};
use crate::util::{display_fn, join};
use std::fmt;

/// Renders a recursive-descent parser in C.
///
/// Each nonterminal becomes a function switching on the next token. The
/// generated code expects the user code section to define `struct
/// <prefix>_node` and the `<prefix>_action_<symbol>_<n>` functions.
#[derive(Debug, Default, Copy, Clone)]
pub struct CRenderer;

impl Render for CRenderer {
    fn render(&self, codegen: &Codegen<'_>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = &codegen.settings;

        section_header(f, "global includes")?;
        write_includes(settings, f)?;

        section_header(f, "utility methods")?;
        write_helpers(settings, f)?;

        section_header(f, "declarations")?;
        write_declarations(codegen, f)?;

        section_header(f, "main automaton")?;
        for routine in &codegen.routines {
            write_routine(settings, routine, f)?;
        }
        if let Some(start) = codegen.start {
            write_entry(settings, start, f)?;
        }

        section_header(f, "user code")?;
        f.write_str(codegen.user_code)
    }
}

fn section_header(f: &mut fmt::Formatter<'_>, heading: &str) -> fmt::Result {
    let rule = "*".repeat(77);
    writeln!(f)?;
    writeln!(f, "/{}", rule)?;
    writeln!(f, " * {:^73} *", heading)?;
    writeln!(f, " {}/", rule)
}

fn write_includes(settings: &Settings, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "#include <stdio.h>")?;
    writeln!(f, "#include <stdlib.h>")?;
    writeln!(f, "#include {}", settings.lexer_include)
}

fn write_helpers(settings: &Settings, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
        f,
        "
typedef struct {p}_node {p}_node_t;

static {tt} {p}_next_token;
static {flag} {p}_token_buffered = 0;

static {tt} {p}_peek_next_token(void)
{{
\tif (!{p}_token_buffered) {{
\t\t{p}_next_token = {lexer};
\t\t{p}_token_buffered = 1;
\t}}

\treturn {p}_next_token;
}}

static {flag} {p}_eat_token({tt} expected_token)
{{
\t{tt} token = {p}_peek_next_token();

\tif (token == expected_token) {{
\t\t{p}_token_buffered = 0;
\t\treturn 1;
\t}}

\treturn 0;
}}
",
        p = settings.prefix,
        tt = settings.token_type,
        flag = settings.token_flag_type,
        lexer = settings.lexer_function,
    )
}

fn write_declarations(codegen: &Codegen<'_>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let settings = &codegen.settings;
    let node_type = settings.prefixed("node_t");

    writeln!(f)?;
    for routine in &codegen.routines {
        writeln!(f, "static {}* {}(void);", node_type, routine.name)?;
    }

    writeln!(f)?;
    for routine in &codegen.routines {
        for branch in &routine.branches {
            writeln!(
                f,
                "{}* {}({});",
                node_type,
                settings.action_name(routine.symbol, branch.expansion),
                parameters(settings, &branch.steps),
            )?;
        }
        if let Some(expansion) = routine.fallback {
            writeln!(
                f,
                "{}* {}(void);",
                node_type,
                settings.action_name(routine.symbol, expansion)
            )?;
        }
    }

    Ok(())
}

// `yy_token_t, yy_node_t*, ...`
fn parameters<'a>(settings: &'a Settings, steps: &'a [Step<'a>]) -> impl fmt::Display + 'a {
    display_fn(move |f| {
        if steps.is_empty() {
            return f.write_str("void");
        }
        let node_type = settings.prefixed("node_t");
        join(
            f,
            steps.iter().map(|step| match step {
                Step::Match { .. } => settings.token_type.clone(),
                Step::Call { .. } => format!("{}*", node_type),
            }),
            ", ",
        )
    })
}

fn write_routine(
    settings: &Settings,
    routine: &Routine<'_>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    let node_type = settings.prefixed("node_t");

    writeln!(f)?;
    writeln!(f, "static {}* {}(void)", node_type, routine.name)?;
    writeln!(f, "{{")?;
    if routine.node_count > 0 {
        writeln!(f, "\t{}* nodes[{}];", node_type, routine.node_count)?;
    }
    writeln!(
        f,
        "\t{} token = {}_peek_next_token();",
        settings.token_type, settings.prefix
    )?;
    writeln!(f)?;
    writeln!(f, "\tswitch (token) {{")?;

    for branch in &routine.branches {
        // fully shadowed by earlier expansions.
        if branch.predictions.is_empty() {
            continue;
        }
        write_branch(settings, routine, branch, f)?;
    }

    writeln!(f, "\tdefault:")?;
    match routine.fallback {
        Some(expansion) => writeln!(
            f,
            "\t\treturn {}();",
            settings.action_name(routine.symbol, expansion)
        )?,
        None => writeln!(f, "\t\tgoto error;")?,
    }
    writeln!(f, "\t}}")?;
    writeln!(f)?;
    writeln!(f, "error:")?;
    writeln!(f, "\treturn NULL;")?;
    writeln!(f, "}}")
}

fn write_branch(
    settings: &Settings,
    routine: &Routine<'_>,
    branch: &Branch<'_>,
    f: &mut fmt::Formatter<'_>,
) -> fmt::Result {
    for terminal in &branch.predictions {
        writeln!(f, "\tcase {}:", terminal.value)?;
    }

    let mut arguments = Vec::with_capacity(branch.steps.len());
    for step in &branch.steps {
        match step {
            Step::Match { terminal, .. } => {
                writeln!(
                    f,
                    "\t\tif (!{}_eat_token({}))",
                    settings.prefix, terminal.value
                )?;
                writeln!(f, "\t\t\tgoto error;")?;
                arguments.push(terminal.value.to_owned());
            }
            Step::Call { symbol, slot, .. } => {
                let node = format!("nodes[{}]", slot);
                writeln!(
                    f,
                    "\t\tif (!({} = {}()))",
                    node,
                    settings.routine_name(symbol)
                )?;
                writeln!(f, "\t\t\tgoto error;")?;
                arguments.push(node);
            }
        }
    }

    writeln!(
        f,
        "\t\treturn {}({});",
        settings.action_name(routine.symbol, branch.expansion),
        arguments.join(", ")
    )?;
    writeln!(f)
}

fn write_entry(settings: &Settings, start: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let node_type = settings.prefixed("node_t");
    writeln!(f)?;
    writeln!(f, "{}* {}(void)", node_type, settings.prefixed("parse"))?;
    writeln!(f, "{{")?;
    writeln!(f, "\treturn {}();", settings.routine_name(start))?;
    writeln!(f, "}}")
}
