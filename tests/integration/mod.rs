mod processor_flow_tests;
