mod twitter_tests;
