//! The fixed C++ program around the generated statements.
//!
//! The generated statements live in `equelleGeneratedCode`, which `main`
//! calls after building the runtime from the command-line parameters.
//! Defining `EQUELLE_NO_MAIN` drops `main` so the code can be linked into a
//! larger program.

const HEADER: &str = "\
// This program was created by the Equelle compiler from SINTEF.

#include <opm/core/utility/parameters/ParameterGroup.hpp>
#include <opm/core/linalg/LinearSolverFactory.hpp>
#include <opm/core/utility/ErrorMacros.hpp>
#include <opm/autodiff/AutoDiffBlock.hpp>
#include <opm/autodiff/AutoDiffHelpers.hpp>
#include <opm/core/grid.h>
#include <opm/core/grid/GridManager.hpp>
#include <algorithm>
#include <iterator>
#include <iostream>
#include <cmath>
#include <array>

#include \"equelle/EquelleRuntimeCPU.hpp\"
";

const GENERATED_START: &str = "    // ============= Generated code starts here ================\n\n";

const GENERATED_END: &str = "\
\n    // ============= Generated code ends here ================

}

void ensureRequirements(const equelle::EquelleRuntimeCPU& er)
{
    (void)er;
}
";

/// Everything up to the first generated statement.
///
/// With `with_grid` the program also builds an `equelle::CartesianGrid`
/// from the same parameters and hands it to the generated code.
pub fn prologue(with_grid: bool) -> String {
    let mut out = String::from(HEADER);
    if with_grid {
        out.push_str("#include \"equelle/CartesianGrid.hpp\"\n");
    }
    out.push('\n');

    let params = if with_grid {
        "equelle::EquelleRuntimeCPU& er, equelle::CartesianGrid& grid"
    } else {
        "equelle::EquelleRuntimeCPU& er"
    };
    out.push_str("void ensureRequirements(const equelle::EquelleRuntimeCPU& er);\n");
    out.push_str(&format!("void equelleGeneratedCode({params});\n\n"));

    out.push_str("#ifndef EQUELLE_NO_MAIN\n");
    out.push_str("int main(int argc, char** argv)\n{\n");
    out.push_str("    // Get user parameters.\n");
    out.push_str("    Opm::parameter::ParameterGroup param(argc, argv, false);\n\n");
    out.push_str("    // Create the Equelle runtime.\n");
    out.push_str("    equelle::EquelleRuntimeCPU er(param);\n");
    if with_grid {
        out.push_str("    equelle::CartesianGrid grid(param);\n");
        out.push_str("    equelleGeneratedCode(er, grid);\n");
    } else {
        out.push_str("    equelleGeneratedCode(er);\n");
    }
    out.push_str("    return 0;\n}\n#endif // EQUELLE_NO_MAIN\n\n");

    out.push_str(&format!("void equelleGeneratedCode({params}) {{\n"));
    out.push_str("    using namespace equelle;\n");
    out.push_str("    ensureRequirements(er);\n\n");
    out.push_str(GENERATED_START);
    out
}

/// Everything after the last generated statement.
pub fn epilogue() -> &'static str {
    GENERATED_END
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_skeleton() {
        let text = prologue(false);
        assert!(text.starts_with("// This program was created by the Equelle compiler"));
        assert!(text.contains("void equelleGeneratedCode(equelle::EquelleRuntimeCPU& er);\n"));
        assert!(text.contains("    equelleGeneratedCode(er);\n"));
        assert!(!text.contains("CartesianGrid"));
        assert!(text.ends_with("// ============= Generated code starts here ================\n\n"));
    }

    #[test]
    fn test_grid_skeleton() {
        let text = prologue(true);
        assert!(text.contains("#include \"equelle/CartesianGrid.hpp\"\n"));
        assert!(text.contains("    equelle::CartesianGrid grid(param);\n"));
        assert!(text.contains("equelleGeneratedCode(equelle::EquelleRuntimeCPU& er, equelle::CartesianGrid& grid) {\n"));
    }

    #[test]
    fn test_epilogue_closes_generated_function() {
        assert!(epilogue().contains("\n}\n\nvoid ensureRequirements"));
        assert!(epilogue().ends_with("    (void)er;\n}\n"));
    }
}
