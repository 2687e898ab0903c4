//! Script stage: minify and mangle a single source with SWC.

use super::Source;
use crate::error::{BuildError, BuildResult};
use swc_common::{sync::Lrc, FileName, FilePathMapping, Globals, Mark, SourceMap, GLOBALS};
use swc_ecma_ast::{EsVersion, Program};
use swc_ecma_codegen::{
    text_writer::{omit_trailing_semi, JsWriter},
    Emitter,
};
use swc_ecma_minifier::option::{CompressOptions, ExtraOptions, MangleOptions, MinifyOptions};
use swc_ecma_parser::{parse_file_as_program, EsSyntax, Syntax};
use swc_ecma_transforms_base::{fixer::fixer, resolver};
use swc_ecma_visit::VisitMutWith as _;

/// `.js` and `.jsx` are both accepted.
fn syntax() -> Syntax {
    Syntax::Es(EsSyntax {
        jsx: true,
        ..Default::default()
    })
}

/// Minify one script. Comments are not preserved.
pub fn minify(source: &Source) -> BuildResult<String> {
    let globals = Globals::new();
    GLOBALS.set(&globals, || minify_program(source))
}

fn minify_program(source: &Source) -> BuildResult<String> {
    let script_error = |message: String| BuildError::Script {
        path: source.path.clone(),
        message,
    };

    let cm = Lrc::new(SourceMap::new(FilePathMapping::empty()));
    let fm = cm.new_source_file(
        FileName::Real(source.path.clone()).into(),
        source.contents.clone(),
    );

    let mut recovered = Vec::new();
    let program = parse_file_as_program(&fm, syntax(), EsVersion::latest(), None, &mut recovered)
        .map_err(|e| script_error(e.into_kind().msg().to_string()))?;
    if let Some(e) = recovered.into_iter().next() {
        return Err(script_error(e.into_kind().msg().to_string()));
    }

    let unresolved_mark = Mark::new();
    let top_level_mark = Mark::new();
    let program = program.apply(&mut resolver(unresolved_mark, top_level_mark, false));

    let mut program = swc_ecma_minifier::optimize(
        program,
        cm.clone(),
        None,
        None,
        &MinifyOptions {
            compress: Some(CompressOptions::default()),
            mangle: Some(MangleOptions::default()),
            ..Default::default()
        },
        &ExtraOptions {
            unresolved_mark,
            top_level_mark,
            mangle_name_cache: None,
        },
    );
    program.visit_mut_with(&mut fixer(None));

    let mut buf = vec![];
    {
        let wr = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default().with_minify(true),
            cm: cm.clone(),
            comments: None,
            wr: omit_trailing_semi(wr),
        };
        let emitted = match &program {
            Program::Module(m) => emitter.emit_module(m),
            Program::Script(s) => emitter.emit_script(s),
        };
        emitted.map_err(|e| script_error(e.to_string()))?;
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}
