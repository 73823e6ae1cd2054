mod integration {
    mod common;
    mod merge_tests;
    mod process_tests;
    mod tool_tests;
}
